//! A generator that interprets the conventional competing build descriptor
//! (`kustomization.yaml`): resources/components composition, name
//! prefix/suffix, namespace, common labels/annotations, and patches.

use std::collections::BTreeMap;

use forge_path::Path;
use forge_resource::{MatchOptions, Tree};
use forge_visit::{AddAnnotations, AddLabels, JsonPatch, NamePrefixSuffix, Namespace, StrategicMergePatch};
use serde::Deserialize;

use crate::engine::{decode_stream_into, resolve};
use crate::error::{BuildError, BuildErrors};

const RECOGNIZED_FILENAMES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PatchTarget {
    group: String,
    version: String,
    kind: String,
    namespace: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Patch {
    target: Option<PatchTarget>,
    #[serde(default)]
    patch: String,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Kustomization {
    resources: Vec<String>,
    components: Vec<String>,
    #[serde(rename = "namePrefix")]
    name_prefix: String,
    #[serde(rename = "nameSuffix")]
    name_suffix: String,
    namespace: String,
    #[serde(rename = "commonLabels")]
    common_labels: BTreeMap<String, String>,
    #[serde(rename = "commonAnnotations")]
    common_annotations: BTreeMap<String, String>,
    patches: Vec<Patch>,
}

/// `{source}` — the generator factory's config. `source` is a path string
/// pointing at a directory carrying a `kustomization.yaml`.
pub struct KustomizeGenerator {
    pub source: String,
}

impl forge_visit::Generator for KustomizeGenerator {
    fn emit(&mut self) -> Result<Tree, forge_visit::GeneratorError> {
        let root = Path::parse(&self.source, std::env::current_dir().unwrap_or_default());
        build(&root).map_err(|errs| forge_visit::GeneratorError::Resource(first_resource_error(errs)))
    }
}

fn first_resource_error(errs: BuildErrors) -> forge_resource::ResourceError {
    for err in errs.0 {
        if let BuildError::Resource(e) = err {
            return e;
        }
    }
    forge_resource::ResourceError::NotAMapping("kustomize build failed")
}

fn read_kustomization(root: &Path) -> Result<Kustomization, BuildError> {
    for name in RECOGNIZED_FILENAMES {
        let candidate = root.join(&[name]);
        if candidate.exists()? {
            let bytes = candidate.open()?;
            return Ok(serde_yaml::from_slice(&bytes).map_err(crate::descriptor::DecodeError::from)?);
        }
    }
    Err(BuildError::Path(forge_path::Error::NotFound(root.to_string())))
}

pub(crate) fn build(root: &Path) -> Result<Tree, BuildErrors> {
    let mut errors = Vec::new();

    let kustomization = match read_kustomization(root) {
        Ok(k) => k,
        Err(e) => {
            errors.push(e);
            return Err(BuildErrors(errors));
        }
    };

    let mut tree = Tree::new();

    for entry in &kustomization.resources {
        let target = resolve(entry, root);
        let mut subtree = Tree::new();
        let result = if target.is_dir().unwrap_or(false) {
            build(&target).map(|t| subtree = t).map_err(|errs| BuildError::Visit(errs.to_string()))
        } else {
            decode_stream_into(&target, &mut subtree)
        };
        if let Err(e) = result {
            errors.push(e);
        }
        if let Err(e) = subtree.copy_into(&mut tree) {
            errors.push(e.into());
        }
    }
    for entry in &kustomization.components {
        let target = resolve(entry, root);
        let result = if target.is_dir().unwrap_or(false) {
            match build(&target) {
                Ok(mut sub) => sub.copy_into(&mut tree).map_err(BuildError::from),
                Err(errs) => Err(BuildError::Visit(errs.to_string())),
            }
        } else {
            decode_stream_into(&target, &mut tree)
        };
        if let Err(e) = result {
            errors.push(e);
        }
    }

    if !kustomization.name_prefix.is_empty() || !kustomization.name_suffix.is_empty() {
        let mut visitor = NamePrefixSuffix {
            prefix: kustomization.name_prefix.clone(),
            suffix: kustomization.name_suffix.clone(),
        };
        if let Err(e) = tree.visit(&mut visitor, &MatchOptions::default()) {
            errors.push(e.into());
        }
    }
    if !kustomization.namespace.is_empty() {
        let mut visitor = Namespace(kustomization.namespace.clone());
        if let Err(e) = tree.visit(&mut visitor, &MatchOptions::default()) {
            errors.push(e.into());
        }
    }
    if !kustomization.common_labels.is_empty() {
        let mut visitor = AddLabels(kustomization.common_labels.clone());
        if let Err(e) = tree.visit(&mut visitor, &MatchOptions::default()) {
            errors.push(e.into());
        }
    }
    if !kustomization.common_annotations.is_empty() {
        let mut visitor = AddAnnotations(kustomization.common_annotations.clone());
        if let Err(e) = tree.visit(&mut visitor, &MatchOptions::default()) {
            errors.push(e.into());
        }
    }
    for patch in &kustomization.patches {
        if let Err(e) = apply_patch(root, patch, &mut tree) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        Ok(tree)
    } else {
        Err(BuildErrors(errors))
    }
}

/// A patch is either an RFC 6902 JSON Patch document or a strategic merge
/// fragment; kustomize's own format stopped distinguishing them explicitly,
/// so — like the system this generator is compatible with — we try JSON
/// Patch first and fall back to a merge.
fn apply_patch(root: &Path, patch: &Patch, tree: &mut Tree) -> Result<(), BuildError> {
    let raw = if !patch.path.is_empty() {
        let target = root.join(&[&patch.path]);
        target.open()?
    } else {
        patch.patch.clone().into_bytes()
    };

    let mut opts = MatchOptions::default();
    if let Some(target) = &patch.target {
        if !target.name.is_empty() {
            opts = opts.names([target.name.clone()]);
        }
        if !target.namespace.is_empty() {
            opts = opts.namespaces([target.namespace.clone()]);
        }
        if !target.kind.is_empty() {
            let kind = if !target.group.is_empty() && !target.version.is_empty() {
                format!("{}/{}/{}", target.group, target.version, target.kind)
            } else {
                target.kind.clone()
            };
            opts = opts.kinds([forge_resource::GroupVersionKind::parse(&kind)]);
        }
    }

    if let Ok(ops) = serde_yaml::from_slice::<json_patch::Patch>(&raw) {
        let mut visitor = JsonPatch(ops);
        return tree.visit(&mut visitor, &opts).map_err(BuildError::from);
    }
    let fragment: serde_json::Value = serde_yaml::from_slice(&raw).map_err(crate::descriptor::DecodeError::from)?;
    let mut visitor = StrategicMergePatch(fragment);
    tree.visit(&mut visitor, &opts).map_err(BuildError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_resource::Resource;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn applies_name_prefix_and_namespace() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "kustomization.yaml",
            "resources: [pod.yaml]\nnamePrefix: pre-\nnamespace: prod\n",
        );
        write(dir.path(), "pod.yaml", "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n");

        let mut tree = build(&Path::local(dir.path())).unwrap();
        let mut seen = Vec::new();
        tree.visit(
            &mut (|r: &mut Resource| {
                seen.push((r.name(), r.namespace()));
                Ok(())
            }),
            &MatchOptions::default(),
        )
        .unwrap();
        assert_eq!(seen, vec![("pre-web".to_string(), "prod".to_string())]);
    }

    #[test]
    fn missing_kustomization_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build(&Path::local(dir.path())).is_err());
    }
}
