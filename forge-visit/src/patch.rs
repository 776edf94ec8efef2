use serde_json::Value;

use forge_resource::{Resource, VisitError, Visitor};

/// Merges `patch` into the resource using a kind-aware strategic merge when
/// a schema is registered for the resource's kind; falls back to a plain
/// deep merge otherwise.
pub struct StrategicMergePatch(pub Value);

impl Visitor for StrategicMergePatch {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.strategic_merge_patch(&self.0).map_err(VisitError::from)
    }
}

/// A plain recursive merge; `null` values in the patch remove the
/// corresponding key.
pub struct MergePatch(pub Value);

impl Visitor for MergePatch {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.merge_patch(&self.0).map_err(VisitError::from)
    }
}

/// Applies RFC 6902 JSON Patch operations.
pub struct JsonPatch(pub json_patch::Patch);

impl Visitor for JsonPatch {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.json_patch(&self.0).map_err(VisitError::from)
    }
}

/// Sets one value at each of several field paths.
pub struct FieldPatch {
    pub paths: Vec<forge_fieldpath::FieldPath>,
    pub value: Value,
}

impl Visitor for FieldPatch {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        for path in &self.paths {
            resource.field_patch(path, self.value.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> Resource {
        Resource::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "app"},
            "spec": {"template": {"spec": {"containers": [{"name": "app"}]}}},
        }))
        .unwrap()
    }

    #[test]
    fn json_patch_replaces_nested_field() {
        let mut r = deployment();
        let patch: json_patch::Patch = serde_json::from_value(json!([
            {"op": "replace", "path": "/spec/template/spec/containers/0/name", "value": "app-main"}
        ]))
        .unwrap();
        JsonPatch(patch).visit(&mut r).unwrap();
        assert_eq!(r.document()["spec"]["template"]["spec"]["containers"][0]["name"], json!("app-main"));
    }

    #[test]
    fn strategic_merge_falls_back_to_plain_merge() {
        let mut r = deployment();
        StrategicMergePatch(json!({"metadata": {"labels": {"tier": "web"}}})).visit(&mut r).unwrap();
        assert_eq!(r.labels().get("tier").unwrap(), "web");
    }
}
