use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::key::{GroupVersionKind, Key};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource document must be a mapping at its root, found {0}")]
    NotAMapping(&'static str),
    #[error("resource is missing required field {0:?}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("strategic merge patch for {kind} {namespace}/{name}: no registered schema")]
    UnregisteredSchema { kind: String, namespace: String, name: String },
    #[error("json patch failed to apply")]
    Json(#[from] json_patch::PatchError),
    #[error("field patch failed to apply")]
    Field(#[from] forge_fieldpath::ApplyError),
    #[error("encoding resource for json patch")]
    Encode(#[from] serde_json::Error),
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A wrapper over an arbitrary nested document, exposing typed accessors
/// for the conventional Kubernetes-style fields and in-place patch
/// operations.
#[derive(Debug, Clone)]
pub struct Resource {
    document: Value,
    match_keys: Vec<GroupVersionKind>,
}

impl Resource {
    /// Wraps `document`, which must be a mapping carrying at least `kind`
    /// and `metadata.name`.
    pub fn new(document: Value) -> Result<Self, ResourceError> {
        if !document.is_object() {
            return Err(ResourceError::NotAMapping(type_name(&document)));
        }
        let mut resource = Resource {
            document,
            match_keys: Vec::new(),
        };
        if resource.kind().is_empty() {
            return Err(ResourceError::MissingField("kind"));
        }
        if resource.name().is_empty() {
            return Err(ResourceError::MissingField("metadata.name"));
        }
        resource.match_keys = resource.build_match_keys();
        Ok(resource)
    }

    fn build_match_keys(&self) -> Vec<GroupVersionKind> {
        let (group, version) = self.group_version();
        let kind = self.kind();
        let w = GroupVersionKind::WILDCARD;
        vec![
            GroupVersionKind { group: w.into(), version: w.into(), kind: w.into() },
            GroupVersionKind { group: w.into(), version: w.into(), kind: kind.clone() },
            GroupVersionKind { group: w.into(), version: version.clone(), kind: w.into() },
            GroupVersionKind { group: w.into(), version: version.clone(), kind: kind.clone() },
            GroupVersionKind { group: group.clone(), version: w.into(), kind: w.into() },
            GroupVersionKind { group: group.clone(), version: w.into(), kind: kind.clone() },
            GroupVersionKind { group: group.clone(), version, kind: w.into() },
            GroupVersionKind { group, version: self.group_version().1, kind },
        ]
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn object(&self) -> &Map<String, Value> {
        self.document.as_object().expect("validated at construction")
    }

    fn object_mut(&mut self) -> &mut Map<String, Value> {
        self.document.as_object_mut().expect("validated at construction")
    }

    fn str_field(&self, key: &str) -> &str {
        self.object().get(key).and_then(Value::as_str).unwrap_or("")
    }

    fn metadata_str(&self, key: &str) -> &str {
        self.object()
            .get("metadata")
            .and_then(Value::as_object)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        self.object_mut()
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .expect("metadata must be a mapping")
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion")
    }

    /// `(group, version)`, derived by splitting [`Self::api_version`] on the
    /// first `/`. An empty group is the core group.
    pub fn group_version(&self) -> (String, String) {
        match self.api_version().split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), self.api_version().to_string()),
        }
    }

    pub fn kind(&self) -> String {
        self.str_field("kind").to_string()
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        let (group, version) = self.group_version();
        GroupVersionKind { group, version, kind: self.kind() }
    }

    pub fn name(&self) -> String {
        self.metadata_str("name").to_string()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata_mut().insert("name".into(), Value::String(name.into()));
    }

    pub fn namespace(&self) -> String {
        self.metadata_str("namespace").to_string()
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.metadata_mut().insert("namespace".into(), Value::String(namespace.into()));
    }

    pub fn key(&self) -> Key {
        let (group, version) = self.group_version();
        Key {
            group,
            version,
            kind: self.kind(),
            namespace: self.namespace(),
            name: self.name(),
        }
    }

    fn string_map(&self, field: &str) -> BTreeMap<String, String> {
        self.object()
            .get("metadata")
            .and_then(Value::as_object)
            .and_then(|m| m.get(field))
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn set_labels(&mut self, labels: BTreeMap<String, String>) {
        let value: Map<String, Value> = labels.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self.metadata_mut().insert("labels".into(), Value::Object(value));
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    pub fn set_annotations(&mut self, annotations: BTreeMap<String, String>) {
        let value: Map<String, Value> = annotations.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self.metadata_mut().insert("annotations".into(), Value::Object(value));
    }

    pub fn has_labels(&self, want: &BTreeMap<String, String>) -> bool {
        let have = self.labels();
        want.iter().all(|(k, v)| have.get(k) == Some(v))
    }

    pub fn has_annotations(&self, want: &BTreeMap<String, String>) -> bool {
        let have = self.annotations();
        want.iter().all(|(k, v)| have.get(k) == Some(v))
    }

    pub fn add_labels(&mut self, labels: BTreeMap<String, String>) {
        let mut merged = self.labels();
        merged.extend(labels);
        self.set_labels(merged);
    }

    pub fn add_annotations(&mut self, annotations: BTreeMap<String, String>) {
        let mut merged = self.annotations();
        merged.extend(annotations);
        self.set_annotations(merged);
    }

    /// The match keys this resource satisfies: `*/*/*`, down to its exact
    /// group/version/kind, used to short-circuit selector evaluation.
    pub fn match_keys(&self) -> &[GroupVersionKind] {
        &self.match_keys
    }

    pub fn equals(&self, other: &Resource) -> bool {
        self.document == other.document
    }

    /// A unified diff of the two resources' YAML-ish JSON rendering.
    pub fn diff(&self, other: &Resource) -> String {
        let a = serde_json::to_string_pretty(&self.document).unwrap_or_default();
        let b = serde_json::to_string_pretty(&other.document).unwrap_or_default();
        similar::TextDiff::from_lines(&a, &b).unified_diff().to_string()
    }

    /// A plain recursive merge of `patch` into this resource's document,
    /// with `patch`'s scalars and arrays overriding.
    pub fn merge_patch(&mut self, patch: &Value) -> Result<(), PatchError> {
        merge_recursive(&mut self.document, patch);
        Ok(())
    }

    /// A strategic-merge-style patch. Without an external kind-aware schema
    /// registry (out of scope for this engine) this always falls back to a
    /// plain recursive merge, matching the fallback path the build engine
    /// takes when a kind's merge-key schema is unknown.
    pub fn strategic_merge_patch(&mut self, patch: &Value) -> Result<(), PatchError> {
        self.merge_patch(patch)
    }

    pub fn json_patch(&mut self, patch: &json_patch::Patch) -> Result<(), PatchError> {
        json_patch::patch(&mut self.document, patch)?;
        Ok(())
    }

    pub fn field_patch(&mut self, path: &forge_fieldpath::FieldPath, value: Value) -> Result<(), PatchError> {
        path.set_value(&mut self.document, value)?;
        Ok(())
    }
}

fn merge_recursive(dst: &mut Value, patch: &Value) {
    match (dst, patch) {
        (Value::Object(dst), Value::Object(patch)) => {
            for (key, value) in patch {
                if let Value::Null = value {
                    dst.remove(key);
                } else {
                    merge_recursive(dst.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (dst, patch) => *dst = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(name: &str, namespace: &str) -> Resource {
        Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace, "labels": {"app": "widgets"}},
        }))
        .unwrap()
    }

    #[test]
    fn rejects_missing_kind() {
        let err = Resource::new(json!({"metadata": {"name": "x"}})).unwrap_err();
        assert!(matches!(err, ResourceError::MissingField("kind")));
    }

    #[test]
    fn group_version_splits_on_first_slash() {
        let r = Resource::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "x"},
        }))
        .unwrap();
        assert_eq!(r.group_version(), ("apps".to_string(), "v1".to_string()));
        let core = pod("x", "default");
        assert_eq!(core.group_version(), (String::new(), "v1".to_string()));
    }

    #[test]
    fn has_labels_is_a_subset_check() {
        let r = pod("x", "default");
        let mut want = BTreeMap::new();
        want.insert("app".to_string(), "widgets".to_string());
        assert!(r.has_labels(&want));
        want.insert("missing".to_string(), "x".to_string());
        assert!(!r.has_labels(&want));
    }

    #[test]
    fn merge_patch_overrides_and_removes_on_null() {
        let mut r = pod("x", "default");
        r.merge_patch(&json!({"metadata": {"labels": {"app": "other"}, "namespace": null}}))
            .unwrap();
        assert_eq!(r.namespace(), "");
        assert_eq!(r.labels().get("app").unwrap(), "other");
    }

    #[test]
    fn field_patch_sets_nested_value() {
        let mut r = Resource::new(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "x"},
            "spec": {"containers": [{"name": "app", "image": "old"}]},
        }))
        .unwrap();
        let fp = forge_fieldpath::FieldPath::parse("spec.containers[name=app].image").unwrap();
        r.field_patch(&fp, json!("new")).unwrap();
        assert_eq!(r.document()["spec"]["containers"][0]["image"], json!("new"));
    }
}
