use std::fmt;

use crate::descriptor::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("reading {0}")]
    Path(#[from] forge_path::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("mutator {0:?} is not registered")]
    UnknownMutator(String),
    #[error("generator {0:?} is not registered")]
    UnknownGenerator(String),
    #[error("kind {0:?} has more than three slash-separated segments")]
    InvalidKind(String),
    #[error("parsing matchFields path {path:?}")]
    FieldPath {
        path: String,
        #[source]
        source: forge_fieldpath::SyntaxError,
    },
    #[error("decoding plugin configuration for {name:?}")]
    Config {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("decoding YAML document from {name:?}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Registry(#[from] forge_registry::RegistryError),
    #[error(transparent)]
    Tree(#[from] forge_resource::TreeError),
    #[error(transparent)]
    Resource(#[from] forge_resource::ResourceError),
    #[error(transparent)]
    Generator(#[from] forge_visit::GeneratorError),
    #[error("{0}")]
    Visit(String),
}

impl From<forge_resource::VisitErrors> for BuildError {
    fn from(errs: forge_resource::VisitErrors) -> Self {
        BuildError::Visit(errs.to_string())
    }
}

/// A joint accumulation of every [`BuildError`] encountered while building.
/// Building proceeds as far as is meaningful rather than aborting on the
/// first error; callers inspect `.0` for the full set.
#[derive(Debug)]
pub struct BuildErrors(pub Vec<BuildError>);

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) while building:", self.0.len())?;
        for err in &self.0 {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}
