//! A document wrapper ([`Resource`]) and a `Key`-indexed store ([`Tree`])
//! supporting selector-driven traversal, in-place mutation, and automatic
//! re-indexing when a mutation changes a resource's identity.

mod key;
mod resource;
mod tree;
mod visitor;

pub use key::{GroupVersionKind, Key};
pub use resource::{PatchError, Resource, ResourceError};
pub use tree::{MatchOptions, Tree, TreeError};
pub use visitor::{Chain, VisitError, VisitErrors, Visitor};
