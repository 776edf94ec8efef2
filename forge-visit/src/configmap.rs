use serde_json::Value;
use thiserror::Error;

use forge_resource::{Resource, VisitError, Visitor};

#[derive(Debug, Error)]
pub enum ConfigMapError {
    #[error("configmap has no string data at key {0:?}")]
    MissingKey(String),
    #[error("decoding JSON stored at data[{key:?}]")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("applying patch to data[{key:?}]")]
    Patch {
        key: String,
        #[source]
        source: json_patch::PatchError,
    },
}

/// Applies an RFC 6902 JSON Patch to the JSON document stored as a string
/// at `data[key]` of a ConfigMap, re-encoding the result back into that key.
pub struct ConfigMapJsonPatch {
    pub key: String,
    pub patch: json_patch::Patch,
}

impl Visitor for ConfigMapJsonPatch {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        apply(&self.key, &self.patch, resource).map_err(|e| VisitError::Other(e.to_string()))
    }
}

fn apply(key: &str, patch: &json_patch::Patch, resource: &mut Resource) -> Result<(), ConfigMapError> {
    let raw = resource
        .document()
        .get("data")
        .and_then(|data| data.get(key))
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigMapError::MissingKey(key.to_string()))?;

    let mut decoded: Value =
        serde_json::from_str(raw).map_err(|source| ConfigMapError::Decode { key: key.to_string(), source })?;
    json_patch::patch(&mut decoded, patch).map_err(|source| ConfigMapError::Patch { key: key.to_string(), source })?;
    let encoded = serde_json::to_string(&decoded).expect("a decoded json::Value always re-encodes");

    let mut document = resource.document().clone();
    document["data"][key] = Value::String(encoded);
    *resource = Resource::new(document).expect("patching an existing resource's data never breaks its shape");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_map(value: &str) -> Resource {
        Resource::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings"},
            "data": {"config.json": value},
        }))
        .unwrap()
    }

    #[test]
    fn patches_json_nested_in_a_data_key() {
        let mut r = config_map(r#"{"logLevel":"info","retries":3}"#);
        let patch: json_patch::Patch = serde_json::from_value(json!([
            {"op": "replace", "path": "/logLevel", "value": "debug"}
        ]))
        .unwrap();
        ConfigMapJsonPatch { key: "config.json".to_string(), patch }.visit(&mut r).unwrap();

        let raw = r.document()["data"]["config.json"].as_str().unwrap();
        let decoded: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(decoded["logLevel"], json!("debug"));
        assert_eq!(decoded["retries"], json!(3));
    }

    #[test]
    fn missing_key_is_an_error() {
        let mut r = config_map(r#"{"a":1}"#);
        let patch: json_patch::Patch = serde_json::from_value(json!([])).unwrap();
        let err = ConfigMapJsonPatch { key: "nope".to_string(), patch }.visit(&mut r).unwrap_err();
        assert!(matches!(err, VisitError::Other(_)));
    }

    #[test]
    fn non_json_value_at_key_is_a_decode_error() {
        let mut r = config_map("not json");
        let patch: json_patch::Patch = serde_json::from_value(json!([])).unwrap();
        let err = ConfigMapJsonPatch { key: "config.json".to_string(), patch }.visit(&mut r).unwrap_err();
        assert!(matches!(err, VisitError::Other(_)));
    }
}
