//! Builds the package at `fixtures/base` and walks only its Deployments,
//! printing each one's name and replica count.
//!
//! How to run:
//!
//!     cargo run -p forge --example inspect

use forge::{GroupVersionKind, MatchOptions, Resource};

fn main() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/fixtures/base");
    let registry = forge::new_registry();
    let root = forge::Path::parse(dir, std::env::current_dir().unwrap());

    let mut tree = match forge::build(&root, &registry) {
        Ok(tree) => tree,
        Err(errs) => {
            eprintln!("{errs}");
            std::process::exit(1);
        }
    };

    let opts = MatchOptions::default().kinds([GroupVersionKind::parse("apps/v1/Deployment")]);
    tree.visit(
        &mut (|r: &mut Resource| {
            let replicas = r.document().pointer("/spec/replicas").and_then(|v| v.as_i64()).unwrap_or(1);
            println!("{} replicas={replicas}", r.name());
            Ok(())
        }),
        &opts,
    )
    .unwrap();
}
