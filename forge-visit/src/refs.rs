//! A small built-in table of back-reference field paths, used by the
//! [`crate::metadata::NamePrefixSuffix`] side effect to rewrite references
//! to a renamed `ConfigMap` or `Secret`.

use serde_json::Value;

/// `(kind, path-spec)` pairs. A path spec is `/`-separated; a `*` segment
/// means "every element of the array here".
const CONFIGMAP_NAME_REFS: &[(&str, &str)] = &[
    ("Deployment", "spec/template/spec/volumes/*/configMap/name"),
    ("Deployment", "spec/template/spec/containers/*/envFrom/*/configMapRef/name"),
    ("Deployment", "spec/template/spec/containers/*/env/*/valueFrom/configMapKeyRef/name"),
    ("StatefulSet", "spec/template/spec/volumes/*/configMap/name"),
    ("StatefulSet", "spec/template/spec/containers/*/envFrom/*/configMapRef/name"),
    ("DaemonSet", "spec/template/spec/volumes/*/configMap/name"),
    ("DaemonSet", "spec/template/spec/containers/*/envFrom/*/configMapRef/name"),
    ("Pod", "spec/volumes/*/configMap/name"),
    ("Pod", "spec/containers/*/envFrom/*/configMapRef/name"),
];

const SECRET_NAME_REFS: &[(&str, &str)] = &[
    ("Deployment", "spec/template/spec/volumes/*/secret/secretName"),
    ("Deployment", "spec/template/spec/containers/*/envFrom/*/secretRef/name"),
    ("Deployment", "spec/template/spec/containers/*/env/*/valueFrom/secretKeyRef/name"),
    ("StatefulSet", "spec/template/spec/volumes/*/secret/secretName"),
    ("StatefulSet", "spec/template/spec/containers/*/envFrom/*/secretRef/name"),
    ("DaemonSet", "spec/template/spec/volumes/*/secret/secretName"),
    ("DaemonSet", "spec/template/spec/containers/*/envFrom/*/secretRef/name"),
    ("Pod", "spec/volumes/*/secret/secretName"),
    ("Pod", "spec/containers/*/envFrom/*/secretRef/name"),
];

/// Path specs a resource of `referencing_kind` should be scanned against
/// when a resource of `renamed_kind` is renamed.
pub(crate) fn paths_for(renamed_kind: &str, referencing_kind: &str) -> Vec<&'static str> {
    let table: &[(&str, &str)] = match renamed_kind {
        "ConfigMap" => CONFIGMAP_NAME_REFS,
        "Secret" => SECRET_NAME_REFS,
        _ => return Vec::new(),
    };
    table
        .iter()
        .filter(|(kind, _)| *kind == referencing_kind)
        .map(|(_, path)| *path)
        .collect()
}

/// Walks `path` inside `doc`, replacing every scalar string value equal to
/// `from` with `to`. `*` segments fan out over every array element.
pub(crate) fn deep_set(doc: &mut Value, path: &[&str], from: &str, to: &str) {
    match path {
        [] => {
            if doc.as_str() == Some(from) {
                *doc = Value::String(to.to_string());
            }
        }
        [head, rest @ ..] if *head == "*" => {
            if let Some(arr) = doc.as_array_mut() {
                for element in arr {
                    deep_set(element, rest, from, to);
                }
            }
        }
        [head, rest @ ..] => {
            if let Some(next) = doc.get_mut(*head) {
                deep_set(next, rest, from, to);
            }
        }
    }
}
