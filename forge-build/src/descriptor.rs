use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Selects a subset of a [`forge_resource::Tree`]'s resources for a mutation
/// or generator to act on. An omitted axis matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Selector {
    #[serde(rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(rename = "matchAnnotations")]
    pub match_annotations: BTreeMap<String, String>,
    #[serde(rename = "matchFields")]
    pub match_fields: BTreeMap<String, Value>,
    pub kinds: Vec<String>,
    pub names: Vec<String>,
    pub namespaces: Vec<String>,
}

/// `{name?, uses, selector?, with?}` — one entry of a `mutate`, `validate`,
/// or `generate` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSpec {
    #[serde(default)]
    pub name: String,
    pub uses: String,
    #[serde(default)]
    pub selector: Selector,
    #[serde(default = "default_with")]
    pub with: Value,
}

fn default_with() -> Value {
    Value::Object(Default::default())
}

/// The build descriptor: `apiVersion`, `kind`, `resources`, `overlays`,
/// `generate`, `mutate`, `validate`. Unrecognized top-level keys are
/// rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDescriptor {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub overlays: Vec<String>,
    #[serde(default)]
    pub generate: Vec<PluginSpec>,
    #[serde(default)]
    pub mutate: Vec<PluginSpec>,
    #[serde(default)]
    pub validate: Vec<PluginSpec>,
}

/// The conventional name of a build descriptor file inside a directory.
pub const DESCRIPTOR_FILENAME: &str = "forgefile.yaml";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decoding {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn decode(bytes: &[u8]) -> Result<BuildDescriptor, DecodeError> {
    Ok(serde_yaml::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_minimal_descriptor() {
        let descriptor = decode(
            br#"
apiVersion: forge.dev/v1alpha1
kind: Config
resources:
  - deployment.yaml
mutate:
  - uses: builtin/namespace
    with:
      name: prod
"#,
        )
        .unwrap();
        assert_eq!(descriptor.resources, vec!["deployment.yaml"]);
        assert_eq!(descriptor.mutate[0].uses, "builtin/namespace");
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let err = decode(
            br#"
apiVersion: forge.dev/v1alpha1
kind: Config
bogus: true
"#,
        );
        assert!(err.is_err());
    }
}
