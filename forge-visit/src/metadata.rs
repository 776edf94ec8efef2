use std::collections::BTreeMap;

use forge_resource::{Resource, Tree, VisitError, Visitor};

use crate::refs;

/// Sets (overwriting) the resource's namespace.
pub struct Namespace(pub String);

impl Visitor for Namespace {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.set_namespace(self.0.clone());
        Ok(())
    }
}

/// Unions labels into the resource's existing set.
pub struct AddLabels(pub BTreeMap<String, String>);

impl Visitor for AddLabels {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.add_labels(self.0.clone());
        Ok(())
    }
}

/// Replaces the resource's label set outright.
pub struct SetLabels(pub BTreeMap<String, String>);

impl Visitor for SetLabels {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.set_labels(self.0.clone());
        Ok(())
    }
}

/// Unions annotations into the resource's existing set.
pub struct AddAnnotations(pub BTreeMap<String, String>);

impl Visitor for AddAnnotations {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.add_annotations(self.0.clone());
        Ok(())
    }
}

/// Replaces the resource's annotation set outright.
pub struct SetAnnotations(pub BTreeMap<String, String>);

impl Visitor for SetAnnotations {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        resource.set_annotations(self.0.clone());
        Ok(())
    }
}

/// Prepends/appends to the resource's name, and rewrites any back-reference
/// to the old name found in a resource of a kind known to [`crate::refs`]
/// (e.g. a Deployment's `envFrom.configMapRef.name`).
#[derive(Default)]
pub struct NamePrefixSuffix {
    pub prefix: String,
    pub suffix: String,
}

impl NamePrefixSuffix {
    fn new_name(&self, current: &str) -> String {
        format!("{}{current}{}", self.prefix, self.suffix)
    }
}

impl Visitor for NamePrefixSuffix {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        let new_name = self.new_name(&resource.name());
        let mut labels = resource.labels();
        for key in ["app.kubernetes.io/name", "app"] {
            if labels.get(key) == Some(&resource.name()) {
                labels.insert(key.to_string(), new_name.clone());
            }
        }
        resource.set_labels(labels);
        resource.set_name(new_name);
        Ok(())
    }

    fn has_side_effect(&self) -> bool {
        true
    }

    fn side_effect(&mut self, before: &Resource, tree: &mut Tree) -> Result<(), VisitError> {
        let old_name = before.name();
        let new_name = self.new_name(&old_name);
        let renamed_kind = before.kind();

        struct RewriteRefs {
            renamed_kind: String,
            old_name: String,
            new_name: String,
        }
        impl Visitor for RewriteRefs {
            fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
                let paths = refs::paths_for(&self.renamed_kind, &resource.kind());
                if paths.is_empty() {
                    return Ok(());
                }
                let mut document = resource.document().clone();
                for path in paths {
                    let segments: Vec<&str> = path.split('/').collect();
                    refs::deep_set(&mut document, &segments, &self.old_name, &self.new_name);
                }
                *resource = Resource::new(document).map_err(|e| VisitError::Other(e.to_string()))?;
                Ok(())
            }
        }

        tree.visit(
            &mut RewriteRefs {
                renamed_kind,
                old_name,
                new_name,
            },
            &Default::default(),
        )
        .map_err(|e| VisitError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_resource::MatchOptions;
    use serde_json::json;

    #[test]
    fn name_prefix_rewrites_configmap_reference() {
        let mut tree = Tree::new();
        tree.insert(
            Resource::new(json!({
                "apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg"},
            }))
            .unwrap(),
        )
        .unwrap();
        tree.insert(
            Resource::new(json!({
                "apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "app"},
                "spec": {"template": {"spec": {"containers": [
                    {"name": "app", "envFrom": [{"configMapRef": {"name": "cfg"}}]}
                ]}}},
            }))
            .unwrap(),
        )
        .unwrap();

        let mut visitor = NamePrefixSuffix { prefix: "pre-".into(), suffix: String::new() };
        let opts = MatchOptions::default().kinds([forge_resource::GroupVersionKind::parse("ConfigMap")]);
        tree.visit(&mut visitor, &opts).unwrap();

        let mut deploy_key = None;
        tree.visit(
            &mut (|r: &mut Resource| {
                if r.kind() == "Deployment" {
                    deploy_key = Some(r.document().clone());
                }
                Ok(())
            }),
            &MatchOptions::default(),
        )
        .unwrap();
        let deploy = deploy_key.unwrap();
        assert_eq!(
            deploy["spec"]["template"]["spec"]["containers"][0]["envFrom"][0]["configMapRef"]["name"],
            json!("pre-cfg")
        );
    }
}
