//! A process-wide mapping from plugin name to the factory that builds it.
//!
//! A `Registry` is populated once, at process startup, by registering every
//! built-in (and any custom) mutator and generator under a stable name; after
//! that it is read-only. Registration is idempotent per name: a second
//! registration under a name already in use is a misconfiguration, not a
//! silent override.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde_json::Value;

use forge_resource::Visitor;
use forge_visit::Generator;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no plugin registered under {0:?}")]
    NotFound(String),
    #[error("{0:?} is already registered")]
    AlreadyRegistered(String),
    #[error("decoding plugin configuration")]
    Config(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Builds a boxed [`Visitor`] from a plugin's `with` configuration.
pub type MutatorFactory = Box<dyn Fn(Value) -> Result<Box<dyn Visitor>, RegistryError> + Send + Sync>;

/// Builds a boxed [`Generator`] from a plugin's `with` configuration.
pub type GeneratorFactory = Box<dyn Fn(Value) -> Result<Box<dyn Generator>, RegistryError> + Send + Sync>;

#[derive(Default)]
struct Inner {
    mutators: HashMap<String, MutatorFactory>,
    generators: HashMap<String, GeneratorFactory>,
}

/// A process-wide mapping of plugin name to factory. See the module docs.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("mutators", &inner.mutators.keys().collect::<Vec<_>>())
            .field("generators", &inner.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry { inner: RwLock::new(Inner::default()) }
    }

    /// Registers a mutator factory under `name`. Errs if `name` is already
    /// registered, for either a mutator or a generator.
    pub fn register_mutator(&self, name: impl Into<String>, factory: MutatorFactory) -> Result<(), RegistryError> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.mutators.contains_key(&name) || inner.generators.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        inner.mutators.insert(name, factory);
        Ok(())
    }

    /// Registers a generator factory under `name`. Errs if `name` is already
    /// registered, for either a mutator or a generator.
    pub fn register_generator(
        &self,
        name: impl Into<String>,
        factory: GeneratorFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.mutators.contains_key(&name) || inner.generators.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        inner.generators.insert(name, factory);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        let inner = self.inner.read();
        inner.mutators.contains_key(name) || inner.generators.contains_key(name)
    }

    /// Looks up and invokes the mutator factory registered under `name`.
    pub fn mutator(&self, name: &str, config: Value) -> Result<Box<dyn Visitor>, RegistryError> {
        let inner = self.inner.read();
        let factory = inner.mutators.get(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        factory(config)
    }

    /// Looks up and invokes the generator factory registered under `name`.
    pub fn generator(&self, name: &str, config: Value) -> Result<Box<dyn Generator>, RegistryError> {
        let inner = self.inner.read();
        let factory = inner.generators.get(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_resource::VisitError;
    use serde_json::json;

    struct Noop;
    impl Visitor for Noop {
        fn visit(&mut self, _resource: &mut forge_resource::Resource) -> Result<(), VisitError> {
            Ok(())
        }
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let registry = Registry::new();
        registry
            .register_mutator("builtin/noop", Box::new(|_config| Ok(Box::new(Noop) as Box<dyn Visitor>)))
            .unwrap();
        assert!(registry.has("builtin/noop"));
        registry.mutator("builtin/noop", json!({})).unwrap();
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = Registry::new();
        registry
            .register_mutator("builtin/noop", Box::new(|_config| Ok(Box::new(Noop) as Box<dyn Visitor>)))
            .unwrap();
        let err = registry
            .register_mutator("builtin/noop", Box::new(|_config| Ok(Box::new(Noop) as Box<dyn Visitor>)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[test]
    fn unknown_name_is_a_distinguishable_error() {
        let registry = Registry::new();
        assert!(matches!(registry.mutator("nope", json!({})), Err(RegistryError::NotFound(_))));
    }
}
