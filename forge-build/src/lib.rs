//! Build descriptor decoding and the build engine: reads a directory's
//! descriptor file, resolves its resources/overlays into a [`Tree`], runs
//! its mutations and generators, and hands back the result.

mod descriptor;
mod emit;
mod engine;
mod error;
mod kustomize;
mod registration;

pub use descriptor::{BuildDescriptor, DecodeError, PluginSpec, Selector, DESCRIPTOR_FILENAME};
pub use emit::emit;
pub use engine::build;
pub use error::{BuildError, BuildErrors};
pub use registration::register_builtins;

pub use forge_resource::Tree;
