use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::key::{GroupVersionKind, Key};
use crate::visitor::{VisitError, VisitErrors, Visitor};
use crate::Resource;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("a different resource already exists at {0}")]
    Conflict(Key),
    #[error("no resource found at {0}")]
    NotFound(Key),
}

/// A predicate selecting a subset of a [`Tree`]'s resources. Built by
/// combining [`MatchOptions::kinds`], [`MatchOptions::names`],
/// [`MatchOptions::namespaces`], [`MatchOptions::labels`], and
/// [`MatchOptions::annotations`]; an option left at its default matches
/// everything for that axis. Each axis unions across repeated calls.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    kinds: Vec<GroupVersionKind>,
    names: Vec<String>,
    namespaces: Vec<String>,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    fields: Vec<(forge_fieldpath::FieldPath, serde_json::Value)>,
}

impl MatchOptions {
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = GroupVersionKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.names.extend(names);
        self
    }

    pub fn namespaces(mut self, namespaces: impl IntoIterator<Item = String>) -> Self {
        self.namespaces.extend(namespaces);
        self
    }

    pub fn labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations.extend(annotations);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = (forge_fieldpath::FieldPath, serde_json::Value)>) -> Self {
        self.fields.extend(fields);
        self
    }

    fn kinds_or_wildcard(&self) -> Vec<GroupVersionKind> {
        if self.kinds.is_empty() {
            vec![GroupVersionKind::wildcard()]
        } else {
            self.kinds.clone()
        }
    }

    fn names_or_wildcard(&self) -> Vec<String> {
        if self.names.is_empty() {
            vec!["*".to_string()]
        } else {
            self.names.clone()
        }
    }

    fn namespaces_or_wildcard(&self) -> Vec<String> {
        if self.namespaces.is_empty() {
            vec!["*".to_string()]
        } else {
            self.namespaces.clone()
        }
    }

    fn admits(&self, resource: &Resource) -> bool {
        (self.labels.is_empty() || resource.has_labels(&self.labels))
            && (self.annotations.is_empty() || resource.has_annotations(&self.annotations))
            && self.fields.iter().all(|(path, want)| path.get_value(resource.document()) == Some(want))
    }
}

#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    resource: Option<Resource>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.resource.is_none()
    }

    fn insert(&mut self, path: &[String], resource: Resource) -> Result<(), TreeError> {
        match path {
            [] => {
                if let Some(existing) = &self.resource {
                    if !existing.equals(&resource) {
                        return Err(TreeError::Conflict(resource.key()));
                    }
                }
                self.resource = Some(resource);
                Ok(())
            }
            [head, rest @ ..] => self.children.entry(head.clone()).or_default().insert(rest, resource),
        }
    }

    fn pop(&mut self, path: &[String]) -> Option<Resource> {
        match path {
            [] => self.resource.take(),
            [head, rest @ ..] => {
                let child = self.children.get_mut(head)?;
                let found = child.pop(rest);
                if found.is_some() && child.is_empty() {
                    self.children.remove(head);
                }
                found
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_at(
        &mut self,
        path: &[String],
        visitor: &mut dyn Visitor,
        opts: &MatchOptions,
        errors: &mut Vec<VisitError>,
        reinsertions: &mut Vec<Resource>,
        side_effects: &mut Vec<Resource>,
    ) {
        match path {
            [] => {
                let Some(resource) = self.resource.as_mut() else { return };
                if !opts.admits(resource) {
                    return;
                }
                let before_key = resource.key();
                let snapshot = if visitor.has_side_effect() { Some(resource.clone()) } else { None };
                match visitor.visit(resource) {
                    Ok(()) => {
                        if resource.key() != before_key {
                            let moved = self.resource.take().expect("just visited");
                            reinsertions.push(moved);
                        }
                        if let Some(snapshot) = snapshot {
                            side_effects.push(snapshot);
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }
            [head, rest @ ..] => {
                if head == "*" {
                    for child in self.children.values_mut() {
                        child.visit_at(rest, visitor, opts, errors, reinsertions, side_effects);
                    }
                } else if let Some(child) = self.children.get_mut(head) {
                    child.visit_at(rest, visitor, opts, errors, reinsertions, side_effects);
                }
            }
        }
    }
}

/// A mutable index mapping [`Key`]s to [`Resource`]s, laid out as a
/// five-level trie over lowercased `[group, version, kind, namespace,
/// name]` segments so that wildcard selectors can short-circuit traversal.
#[derive(Default)]
pub struct Tree {
    root: Node,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Errors unless a resource already at this key is structurally
    /// identical to `resource`.
    pub fn insert(&mut self, resource: Resource) -> Result<(), TreeError> {
        let path = resource.key().path();
        self.root.insert(&path, resource)
    }

    pub fn pop(&mut self, key: &Key) -> Result<Resource, TreeError> {
        self.root.pop(&key.path()).ok_or_else(|| TreeError::NotFound(key.clone()))
    }

    /// Visits every resource matching `opts`. Identity-changing visits are
    /// re-indexed; visitors implementing [`Visitor::side_effect`] are
    /// invoked, once per successfully visited resource, after the full
    /// matched set has been visited.
    pub fn visit(&mut self, visitor: &mut dyn Visitor, opts: &MatchOptions) -> Result<(), VisitErrors> {
        let mut errors = Vec::new();
        let mut reinsertions = Vec::new();
        let mut side_effects = Vec::new();

        for gvk in opts.kinds_or_wildcard() {
            for namespace in opts.namespaces_or_wildcard() {
                for name in opts.names_or_wildcard() {
                    let path = [
                        gvk.group.to_lowercase(),
                        gvk.version.to_lowercase(),
                        gvk.kind.to_lowercase(),
                        namespace.to_lowercase(),
                        name.to_lowercase(),
                    ];
                    self.root
                        .visit_at(&path, visitor, opts, &mut errors, &mut reinsertions, &mut side_effects);
                }
            }
        }

        for resource in reinsertions {
            if let Err(err) = self.insert(resource) {
                errors.push(err.into());
            }
        }

        for snapshot in side_effects {
            if let Err(err) = visitor.side_effect(&snapshot, self) {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VisitErrors(errors))
        }
    }

    /// Visits every resource in `self`, inserting each into `dst`.
    pub fn copy_into(&mut self, dst: &mut Tree) -> Result<(), VisitErrors> {
        struct Copier<'a>(&'a mut Tree);
        impl Visitor for Copier<'_> {
            fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
                self.0.insert(resource.clone()).map_err(VisitError::from)
            }
        }
        self.visit(&mut Copier(dst), &MatchOptions::default())
    }
}
