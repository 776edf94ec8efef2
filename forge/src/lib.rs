//! Public facade over the build engine: a stable set of re-exports for
//! [`Path`], [`Tree`], [`Resource`] and the built-in mutators/generators,
//! plus the two entry points most callers need — [`new_registry`] and
//! [`build_and_emit`].

use std::sync::Arc;

pub use forge_build::{
    build, emit, register_builtins, BuildDescriptor, BuildError, BuildErrors, DecodeError, PluginSpec, Selector,
    DESCRIPTOR_FILENAME,
};
pub use forge_fieldpath::{ApplyError as FieldPathApplyError, FieldPath, SyntaxError as FieldPathSyntaxError};
pub use forge_path::{GitHubClient, Path, CACHE_DIR_VAR, GITHUB_TOKEN_VAR};
pub use forge_registry::{GeneratorFactory, MutatorFactory, Registry, RegistryError};
pub use forge_resource::{
    GroupVersionKind, Key, MatchOptions, PatchError, Resource, ResourceError, Tree, TreeError, VisitError,
    VisitErrors, Visitor,
};
pub use forge_visit::{
    AddAnnotations, AddLabels, FieldPatch, Generator, GeneratorError, JsonPatch, MergePatch, NamePrefixSuffix,
    Namespace, Script, ScriptError, Service, SetAnnotations, SetLabels, StrategicMergePatch, Template,
};

/// A [`Registry`] with every built-in mutator and generator registered
/// under its `builtin.forge.dev/...` name, ready to pass to [`build`].
pub fn new_registry() -> Arc<Registry> {
    let registry = Registry::new();
    register_builtins(&registry);
    Arc::new(registry)
}

/// Parses `input` relative to the current working directory, builds the
/// resource tree it describes against `registry`, and renders the result as
/// a `---`-separated YAML document stream.
pub fn build_and_emit(input: &str, registry: &Arc<Registry>) -> Result<String, BuildErrors> {
    let root = Path::parse(input, std::env::current_dir().unwrap_or_default());
    let mut tree = build(&root, registry)?;
    emit(&mut tree).map_err(|e| BuildErrors(vec![BuildError::Visit(e.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_emits_a_minimal_package() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DESCRIPTOR_FILENAME),
            "apiVersion: forge.dev/v1alpha1\nkind: Config\nresources: [pod.yaml]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pod.yaml"),
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n",
        )
        .unwrap();

        let registry = new_registry();
        let out = build_and_emit(dir.path().to_str().unwrap(), &registry).unwrap();
        assert!(out.contains("name: web"));
    }
}
