use forge_resource::{MatchOptions, Resource, Tree};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("encoding resource as YAML")]
    Encode(#[from] serde_yaml::Error),
    #[error(transparent)]
    Visit(#[from] forge_resource::VisitErrors),
}

/// Walks `tree` in deterministic (group, version, kind, namespace, name)
/// order and encodes each resource as a `---`-separated YAML document
/// stream. Pure over the tree: identical input produces byte-identical
/// output.
pub fn emit(tree: &mut Tree) -> Result<String, EmitError> {
    let mut resources = Vec::new();
    tree.visit(
        &mut (|r: &mut Resource| {
            resources.push(r.clone());
            Ok(())
        }),
        &MatchOptions::default(),
    )?;
    resources.sort_by(|a, b| {
        let (ak, bk) = (a.key(), b.key());
        (&ak.group, &ak.version, &ak.kind, &ak.namespace, &ak.name).cmp(&(
            &bk.group,
            &bk.version,
            &bk.kind,
            &bk.namespace,
            &bk.name,
        ))
    });

    let mut out = String::new();
    for resource in &resources {
        if resource.document().is_null() {
            continue;
        }
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(resource.document())?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(name: &str) -> Resource {
        Resource::new(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": name}})).unwrap()
    }

    #[test]
    fn emits_in_deterministic_sorted_order() {
        let mut tree = Tree::new();
        tree.insert(pod("zeta")).unwrap();
        tree.insert(pod("alpha")).unwrap();
        let out = emit(&mut tree).unwrap();
        let alpha_pos = out.find("alpha").unwrap();
        let zeta_pos = out.find("zeta").unwrap();
        assert!(alpha_pos < zeta_pos);
        assert_eq!(out.matches("---").count(), 2);
    }

    #[test]
    fn is_pure_across_repeated_calls() {
        let mut tree = Tree::new();
        tree.insert(pod("web")).unwrap();
        assert_eq!(emit(&mut tree).unwrap(), emit(&mut tree).unwrap());
    }
}
