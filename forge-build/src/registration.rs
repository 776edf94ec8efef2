use std::collections::BTreeMap;

use forge_registry::{Registry, RegistryError};
use forge_resource::Visitor;
use forge_visit::{
    AddAnnotations, AddLabels, ConfigMapJsonPatch, FieldPatch, Generator, JsonPatch, MergePatch, NamePrefixSuffix,
    Namespace, Script, Service, SetAnnotations, SetLabels, StrategicMergePatch, Template,
};
use serde::Deserialize;
use serde_json::Value;

use crate::kustomize::KustomizeGenerator;

macro_rules! mutator {
    ($registry:expr, $name:expr, $body:expr) => {
        $registry.register_mutator($name, Box::new($body)).expect("builtin names are unique")
    };
}

macro_rules! generator {
    ($registry:expr, $name:expr, $body:expr) => {
        $registry.register_generator($name, Box::new($body)).expect("builtin names are unique")
    };
}

/// Populates `registry` with every mutator and generator this engine ships,
/// under a stable `builtin.forge.dev/...` name. Idempotent only as far as
/// the registry itself is: calling this twice on the same registry fails on
/// the second call, by design (a second registration under a name already
/// in use is a misconfiguration, not a silent no-op).
pub fn register_builtins(registry: &Registry) {
    mutator!(registry, "builtin.forge.dev/strategicMergePatch", |config: Value| {
        Ok(Box::new(StrategicMergePatch(config)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/mergePatch", |config: Value| {
        Ok(Box::new(MergePatch(config)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/jsonPatch", |config: Value| {
        let patch: json_patch::Patch = serde_json::from_value(config)?;
        Ok(Box::new(JsonPatch(patch)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/fieldPatch", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            paths: Vec<String>,
            value: Value,
        }
        let c: Config = serde_json::from_value(config)?;
        let paths = c
            .paths
            .into_iter()
            .map(forge_fieldpath::FieldPath::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RegistryError::Other(e.to_string()))?;
        Ok(Box::new(FieldPatch { paths, value: c.value }) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/namespace", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            name: String,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(Namespace(c.name)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/labels", |config: Value| {
        let labels: BTreeMap<String, String> = serde_json::from_value(config)?;
        Ok(Box::new(AddLabels(labels)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/labels/set", |config: Value| {
        let labels: BTreeMap<String, String> = serde_json::from_value(config)?;
        Ok(Box::new(SetLabels(labels)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/annotations", |config: Value| {
        let annotations: BTreeMap<String, String> = serde_json::from_value(config)?;
        Ok(Box::new(AddAnnotations(annotations)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/annotations/set", |config: Value| {
        let annotations: BTreeMap<String, String> = serde_json::from_value(config)?;
        Ok(Box::new(SetAnnotations(annotations)) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/metadata/name", |config: Value| {
        #[derive(Deserialize, Default)]
        struct Config {
            #[serde(default)]
            prefix: String,
            #[serde(default)]
            suffix: String,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(NamePrefixSuffix { prefix: c.prefix, suffix: c.suffix }) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/configmap/jsonPatch", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            key: String,
            patch: Value,
        }
        let c: Config = serde_json::from_value(config)?;
        let patch: json_patch::Patch = serde_json::from_value(c.patch)?;
        Ok(Box::new(ConfigMapJsonPatch { key: c.key, patch }) as Box<dyn Visitor>)
    });
    mutator!(registry, "builtin.forge.dev/script", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            source: String,
            #[serde(default)]
            config: Value,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(Script::new(c.source, c.config)) as Box<dyn Visitor>)
    });

    generator!(registry, "builtin.forge.dev/service", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            name: String,
            image: String,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(Service { name: c.name, image: c.image }) as Box<dyn Generator>)
    });
    generator!(registry, "builtin.forge.dev/template", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            directory: std::path::PathBuf,
            #[serde(default)]
            values: BTreeMap<String, Value>,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(Template { directory: c.directory, values: c.values }) as Box<dyn Generator>)
    });
    generator!(registry, "builtin.forge.dev/kustomize", |config: Value| {
        #[derive(Deserialize)]
        struct Config {
            source: String,
        }
        let c: Config = serde_json::from_value(config)?;
        Ok(Box::new(KustomizeGenerator { source: c.source }) as Box<dyn Generator>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_builtin_exactly_once() {
        let registry = Registry::new();
        register_builtins(&registry);
        assert!(registry.has("builtin.forge.dev/strategicMergePatch"));
        assert!(registry.has("builtin.forge.dev/kustomize"));
    }
}
