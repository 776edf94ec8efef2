//! Built-in [`forge_resource::Visitor`] implementations (mutation plugins)
//! and the [`Generator`] contract with its built-in generators.

mod configmap;
mod generator;
mod metadata;
mod patch;
mod refs;
mod script;

pub use configmap::{ConfigMapError, ConfigMapJsonPatch};
pub use generator::{Generator, GeneratorError, Service, Template};
pub use metadata::{AddAnnotations, AddLabels, Namespace, NamePrefixSuffix, SetAnnotations, SetLabels};
pub use patch::{FieldPatch, JsonPatch, MergePatch, StrategicMergePatch};
pub use script::{Script, ScriptError};
