use std::sync::Arc;

use forge_path::Path;
use forge_registry::Registry;
use forge_resource::{GroupVersionKind, MatchOptions, Resource, Tree};
use serde_yaml::Deserializer;

use crate::descriptor::{self, BuildDescriptor, PluginSpec, DESCRIPTOR_FILENAME};
use crate::error::{BuildError, BuildErrors};

/// Parses `kind` as `group/version/kind`, `group/kind`, or bare `kind`,
/// rejecting more than three slash-separated segments.
fn parse_kind(kind: &str) -> Result<GroupVersionKind, BuildError> {
    if kind.matches('/').count() > 2 {
        return Err(BuildError::InvalidKind(kind.to_string()));
    }
    Ok(GroupVersionKind::parse(kind))
}

fn selector_to_match_options(selector: &descriptor::Selector) -> Result<MatchOptions, BuildError> {
    let mut kinds = Vec::with_capacity(selector.kinds.len());
    for kind in &selector.kinds {
        kinds.push(parse_kind(kind)?);
    }
    let mut fields = Vec::with_capacity(selector.match_fields.len());
    for (path, value) in &selector.match_fields {
        let parsed = forge_fieldpath::FieldPath::parse(path.clone())
            .map_err(|source| BuildError::FieldPath { path: path.clone(), source })?;
        fields.push((parsed, value.clone()));
    }
    Ok(MatchOptions::default()
        .kinds(kinds)
        .names(selector.names.clone())
        .namespaces(selector.namespaces.clone())
        .labels(selector.match_labels.clone())
        .annotations(selector.match_annotations.clone())
        .fields(fields))
}

/// Reads the descriptor at `descriptor_path/forgefile.yaml`, validates it,
/// and runs the build algorithm: resolve resources and overlays, run
/// mutations, run generators. Returns every error encountered jointly
/// rather than aborting on the first.
#[tracing::instrument(skip(descriptor_path, registry), fields(path = %descriptor_path))]
pub fn build(descriptor_path: &Path, registry: &Arc<Registry>) -> Result<Tree, BuildErrors> {
    let mut errors = Vec::new();

    let descriptor = match read_descriptor(descriptor_path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(e);
            return Err(BuildErrors(errors));
        }
    };

    let _validate = tracing::debug_span!("validate").entered();
    for spec in descriptor.mutate.iter().chain(descriptor.validate.iter()) {
        if let Err(e) = validate_plugin_spec(spec, registry, false) {
            errors.push(e);
        }
    }
    for spec in &descriptor.generate {
        if let Err(e) = validate_plugin_spec(spec, registry, true) {
            errors.push(e);
        }
    }
    drop(_validate);
    if !errors.is_empty() {
        tracing::warn!(count = errors.len(), "validation failed");
        return Err(BuildErrors(errors));
    }

    let mut tree = Tree::new();

    {
        let _resources = tracing::debug_span!("resources", count = descriptor.resources.len()).entered();
        for entry in &descriptor.resources {
            let target = resolve(entry, descriptor_path);
            let mut subtree = Tree::new();
            if let Err(e) = resolve_into(&target, &mut subtree, registry) {
                errors.push(e);
            }
            if let Err(e) = subtree.copy_into(&mut tree) {
                errors.push(e.into());
            }
        }
    }
    {
        let _overlays = tracing::debug_span!("overlays", count = descriptor.overlays.len()).entered();
        for entry in &descriptor.overlays {
            let target = resolve(entry, descriptor_path);
            if let Err(e) = resolve_into(&target, &mut tree, registry) {
                errors.push(e);
            }
        }
    }

    {
        let _mutations = tracing::debug_span!("mutations", count = descriptor.mutate.len()).entered();
        for spec in &descriptor.mutate {
            if let Err(e) = apply_mutation(spec, registry, &mut tree) {
                errors.push(e);
            }
        }
    }

    {
        let _generators = tracing::debug_span!("generators", count = descriptor.generate.len()).entered();
        for spec in &descriptor.generate {
            match apply_generator(spec, registry) {
                Ok(mut subtree) => {
                    if let Err(e) = subtree.copy_into(&mut tree) {
                        errors.push(e.into());
                    }
                }
                Err(e) => errors.push(e),
            }
        }
    }

    if errors.is_empty() {
        Ok(tree)
    } else {
        tracing::warn!(count = errors.len(), "build failed");
        Err(BuildErrors(errors))
    }
}

fn read_descriptor(descriptor_path: &Path) -> Result<BuildDescriptor, BuildError> {
    let file = descriptor_path.join(&[DESCRIPTOR_FILENAME]);
    let bytes = file.open()?;
    Ok(descriptor::decode(&bytes)?)
}

/// Confirms `spec.uses` is registered, its `with` body decodes into the
/// plugin's typed config, and its selector's kind strings are well-formed —
/// without committing the resulting visitor/generator to anything.
fn validate_plugin_spec(spec: &PluginSpec, registry: &Arc<Registry>, is_generator: bool) -> Result<(), BuildError> {
    if is_generator {
        registry.generator(&spec.uses, spec.with.clone()).map_err(|e| match e {
            forge_registry::RegistryError::NotFound(_) => BuildError::UnknownGenerator(spec.uses.clone()),
            other => other.into(),
        })?;
    } else {
        registry.mutator(&spec.uses, spec.with.clone()).map_err(|e| match e {
            forge_registry::RegistryError::NotFound(_) => BuildError::UnknownMutator(spec.uses.clone()),
            other => other.into(),
        })?;
    }
    for kind in &spec.selector.kinds {
        parse_kind(kind)?;
    }
    Ok(())
}

/// Resolves `entry` to a [`Path`]: relative entries join onto `root`,
/// anything else (an absolute local path or a remote Git spec) is parsed
/// independently.
pub(crate) fn resolve(entry: &str, root: &Path) -> Path {
    if Path::is_relative_spec(entry) {
        root.join(&[entry])
    } else {
        Path::parse(entry, std::env::current_dir().unwrap_or_default())
    }
}

/// Inserts `target` into `tree`: a directory recurses into a fresh build,
/// copied in; a file is decoded as a multi-document YAML stream.
fn resolve_into(target: &Path, tree: &mut Tree, registry: &Arc<Registry>) -> Result<(), BuildError> {
    if target.is_dir()? {
        let mut subtree = build(target, registry).map_err(|errs| BuildError::Visit(errs.to_string()))?;
        subtree.copy_into(tree).map_err(BuildError::from)?;
        return Ok(());
    }
    decode_stream_into(target, tree)
}

/// Decodes `target` as a multi-document YAML stream, inserting each
/// non-empty document into `tree` as a [`Resource`]. Does not recurse into
/// directories.
pub(crate) fn decode_stream_into(target: &Path, tree: &mut Tree) -> Result<(), BuildError> {
    let bytes = target.open()?;
    let text = String::from_utf8_lossy(&bytes);
    for document in Deserializer::from_str(&text) {
        let value = serde_json::Value::deserialize(document)
            .map_err(|e| BuildError::Yaml { name: target.to_string(), source: e })?;
        if value.is_null() {
            continue;
        }
        let resource = Resource::new(value)?;
        tree.insert(resource)?;
    }
    Ok(())
}

fn apply_mutation(spec: &PluginSpec, registry: &Arc<Registry>, tree: &mut Tree) -> Result<(), BuildError> {
    let mut visitor = registry.mutator(&spec.uses, spec.with.clone())?;
    let opts = selector_to_match_options(&spec.selector)?;
    tree.visit(visitor.as_mut(), &opts).map_err(BuildError::from)
}

fn apply_generator(spec: &PluginSpec, registry: &Arc<Registry>) -> Result<Tree, BuildError> {
    let mut generator = registry.generator(&spec.uses, spec.with.clone())?;
    generator.emit().map_err(BuildError::from)
}

use serde::Deserialize;

#[cfg(test)]
mod tests {
    use super::*;
    use forge_registry::Registry;

    fn write(dir: &std::path::Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn builds_a_single_resource_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            DESCRIPTOR_FILENAME,
            "apiVersion: forge.dev/v1alpha1\nkind: Config\nresources: [pod.yaml]\n",
        );
        write(
            dir.path(),
            "pod.yaml",
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n",
        );
        let registry = Arc::new(Registry::new());
        let root = Path::local(dir.path());
        let mut tree = build(&root, &registry).unwrap();
        let mut names = Vec::new();
        tree.visit(
            &mut (|r: &mut Resource| {
                names.push(r.name());
                Ok(())
            }),
            &MatchOptions::default(),
        )
        .unwrap();
        assert_eq!(names, vec!["web".to_string()]);
    }

    #[test]
    fn unknown_mutator_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            DESCRIPTOR_FILENAME,
            "apiVersion: forge.dev/v1alpha1\nkind: Config\nmutate:\n  - uses: nope\n",
        );
        let registry = Arc::new(Registry::new());
        let root = Path::local(dir.path());
        let err = match build(&root, &registry) {
            Ok(_) => panic!("expected an unknown-mutator error"),
            Err(errs) => errs,
        };
        assert!(err.0.iter().any(|e| matches!(e, BuildError::UnknownMutator(_))));
    }

    #[test]
    fn directory_resource_recurses_into_a_subtree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write(
            dir.path(),
            DESCRIPTOR_FILENAME,
            "apiVersion: forge.dev/v1alpha1\nkind: Config\nresources: [sub]\n",
        );
        write(
            &dir.path().join("sub"),
            DESCRIPTOR_FILENAME,
            "apiVersion: forge.dev/v1alpha1\nkind: Config\nresources: [pod.yaml]\n",
        );
        write(
            &dir.path().join("sub"),
            "pod.yaml",
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: nested\n",
        );
        let registry = Arc::new(Registry::new());
        let root = Path::local(dir.path());
        let mut tree = build(&root, &registry).unwrap();
        let mut names = Vec::new();
        tree.visit(
            &mut (|r: &mut Resource| {
                names.push(r.name());
                Ok(())
            }),
            &MatchOptions::default(),
        )
        .unwrap();
        assert_eq!(names, vec!["nested".to_string()]);
    }
}
