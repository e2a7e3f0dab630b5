//! The reversible [`Command`] contract.
//!
//! A command names its targets by [`Reference`], never by handle, and
//! records whatever it needs to reverse itself the first time it executes.
//! [`History`](crate::history::History) drives the lifecycle:
//!
//! ```text
//! validate -> execute            (recorded)
//!             unexecute          (undo)
//! validate -> execute            (redo, from the recorded state)
//! ```
//!
//! `validate` must not mutate anything. If it passes, `execute` is expected
//! to succeed; a failure there is logged as an error by the history.

use std::fmt;

use kinship_graph::prelude::*;

/// A reversible graph mutation.
pub trait Command: fmt::Debug + Send + Sync {
    /// Short, stable label for history listings and logs.
    fn name(&self) -> &'static str;

    /// Check every precondition against the current graph.
    fn validate(&self, graph: &Graph) -> Result<(), GraphError>;

    fn execute(&mut self, graph: &mut Graph) -> Result<(), GraphError>;

    /// Reverse the most recent `execute`.
    fn unexecute(&mut self, graph: &mut Graph) -> Result<(), GraphError>;

    /// The entity this command is about, as it is named after `execute`.
    fn subject(&self) -> Option<Reference> {
        None
    }
}

/// Resolve a command's own target. A missing target is a validation failure,
/// not a resolution failure: the command cannot run.
pub(crate) fn resolve(graph: &Graph, reference: &Reference) -> Result<EntityId, GraphError> {
    graph
        .resolve(reference)
        .map_err(|err| ValidationError::from(err).into())
}

/// Fail with `NameTaken` if `name` is used in `type_tag` by anyone but
/// `owner`.
pub(crate) fn ensure_name_free(
    graph: &Graph,
    type_tag: TypeTag,
    name: &str,
    owner: Option<EntityId>,
) -> Result<(), GraphError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    match graph.find(type_tag, name) {
        Some(existing) if Some(existing) != owner => Err(ValidationError::NameTaken {
            type_name: graph.schema().type_name(type_tag).to_owned(),
            name: name.to_owned(),
        }
        .into()),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
