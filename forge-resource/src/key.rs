use std::fmt;

/// The identity of a [`crate::Resource`]: its group, version, kind,
/// namespace, and name. Two resources with the same `Key` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl Key {
    /// The lowercased path this key indexes to inside a [`crate::Tree`].
    pub(crate) fn path(&self) -> [String; 5] {
        [
            self.group.to_lowercase(),
            self.version.to_lowercase(),
            self.kind.to_lowercase(),
            self.namespace.to_lowercase(),
            self.name.to_lowercase(),
        ]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}/{}",
            self.group, self.version, self.kind, self.namespace, self.name
        )
    }
}

/// A group/version/kind triple, possibly carrying `*` wildcards, used to
/// select resources in a [`crate::MatchOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub const WILDCARD: &'static str = "*";

    pub fn wildcard() -> Self {
        GroupVersionKind {
            group: Self::WILDCARD.into(),
            version: Self::WILDCARD.into(),
            kind: Self::WILDCARD.into(),
        }
    }

    /// Parses `group/version/kind`, `group/kind`, or bare `kind`, filling
    /// omitted segments with `*`.
    pub fn parse(s: &str) -> Self {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [kind] => GroupVersionKind {
                group: Self::WILDCARD.into(),
                version: Self::WILDCARD.into(),
                kind: (*kind).into(),
            },
            [group, kind] => GroupVersionKind {
                group: (*group).into(),
                version: Self::WILDCARD.into(),
                kind: (*kind).into(),
            },
            [group, version, kind] => GroupVersionKind {
                group: (*group).into(),
                version: (*version).into(),
                kind: (*kind).into(),
            },
            _ => GroupVersionKind {
                group: (*parts.first().unwrap_or(&"*")).into(),
                version: Self::WILDCARD.into(),
                kind: Self::WILDCARD.into(),
            },
        }
    }
}
