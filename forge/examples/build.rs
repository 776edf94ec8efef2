//! Builds the package at `fixtures/overlay` and prints the resulting
//! resources as a YAML document stream.
//!
//! How to run:
//!
//!     cargo run -p forge --example build
//!
//! Set `RUST_LOG=forge_build=debug` to see a span per build phase.

fn main() {
    tracing_subscriber::fmt::init();
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/fixtures/overlay");
    let registry = forge::new_registry();
    match forge::build_and_emit(dir, &registry) {
        Ok(yaml) => print!("{yaml}"),
        Err(errs) => {
            eprintln!("{errs}");
            std::process::exit(1);
        }
    }
}
