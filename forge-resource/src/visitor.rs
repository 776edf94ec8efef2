use std::fmt;

use thiserror::Error;

use crate::resource::PatchError;
use crate::tree::{Tree, TreeError};
use crate::Resource;

/// Errors a [`Visitor`] may raise while visiting a single [`Resource`].
#[derive(Debug, Error)]
pub enum VisitError {
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("{0}")]
    Other(String),
}

/// A mutation over a single [`Resource`]. Visitors compose as a [`Chain`];
/// the first error aborts the chain.
///
/// A visitor that also needs to rewrite *other* resources in response to a
/// mutation (e.g. a rename that must update back-references) additionally
/// overrides [`Visitor::side_effect`] and [`Visitor::has_side_effect`]; the
/// owning [`Tree`] calls `side_effect` once per successfully-visited
/// resource, after the whole matched set has been visited, passing the
/// pre-mutation snapshot and the tree itself so back-references can be
/// rewritten.
pub trait Visitor {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError>;

    fn has_side_effect(&self) -> bool {
        false
    }

    fn side_effect(&mut self, _before: &Resource, _tree: &mut Tree) -> Result<(), VisitError> {
        Ok(())
    }
}

impl<F> Visitor for F
where
    F: FnMut(&mut Resource) -> Result<(), VisitError>,
{
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        self(resource)
    }
}

/// A sequential composition of visitors; the first error aborts.
pub struct Chain(Vec<Box<dyn Visitor>>);

impl Chain {
    pub fn new(visitors: Vec<Box<dyn Visitor>>) -> Self {
        Chain(visitors)
    }
}

impl Visitor for Chain {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        for visitor in &mut self.0 {
            visitor.visit(resource)?;
        }
        Ok(())
    }
}

/// The joint error raised by [`Tree::visit`] when one or more matched
/// resources failed to visit.
#[derive(Debug)]
pub struct VisitErrors(pub Vec<VisitError>);

impl fmt::Display for VisitErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) while visiting:", self.0.len())?;
        for err in &self.0 {
            writeln!(f, "  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VisitErrors {}
