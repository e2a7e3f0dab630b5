//! Kinship graph -- a typed, in-memory entity-relationship store.
//!
//! Entities of each declared type live in a dense [`Pack`](pack::Pack) with one
//! column per component. They carry a durable [`Identity`](identity::Identity)
//! (type + unique name) and may be linked by typed parent/child relations, with
//! cardinality and cascade rules, and by symmetric partner relations.
//!
//! Storage removal is swap-with-last, so rows move. Relation edges are keyed by
//! generational [`EntityId`](entity::EntityId)s that follow the entity across
//! moves. Anything that must survive destruction and recreation holds a
//! [`Reference`](identity::Reference) instead.
//!
//! # Quick Start
//!
//! ```
//! use kinship_graph::prelude::*;
//!
//! #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Title(String);
//!
//! let mut schema = Schema::new();
//! let folder = schema.declare_type("Folder").unwrap();
//! let note = schema.declare_type("Note").unwrap();
//! schema.add_component::<Title>(note, "title").unwrap();
//! schema
//!     .declare_child(folder, note, Cardinality::OneToMany, Dependency::Strong)
//!     .unwrap();
//!
//! let mut graph = Graph::new(schema).unwrap();
//! let inbox = graph.create(folder, &EntityName::unique("inbox")).unwrap();
//! let todo = graph.create(note, &EntityName::generic("note")).unwrap();
//! graph.set(todo, Title("buy milk".into())).unwrap();
//! graph.add_child(inbox, todo).unwrap();
//!
//! graph.destroy(inbox).unwrap();
//! assert!(!graph.is_alive(todo));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod graph;
pub mod identity;
pub mod pack;
pub mod relation;
pub mod schema;
pub mod snapshot;
pub mod state;

use entity::EntityId;
use identity::Reference;
use schema::TypeTag;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A precondition of a graph operation does not hold. Nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name '{name}' is already taken in '{type_name}'")]
    NameTaken { type_name: String, name: String },

    #[error("entity names must not be empty")]
    EmptyName,

    /// The handle is stale or was never allocated.
    #[error("entity {0:?} does not exist (stale or never allocated)")]
    StaleEntity(EntityId),

    #[error("reference {0} does not resolve to a live entity")]
    Unresolved(Reference),

    #[error("no relation declared from '{parent}' to '{child}'")]
    UndeclaredRelation { parent: String, child: String },

    #[error("no partner relation declared between '{first}' and '{second}'")]
    UndeclaredPartner { first: String, second: String },

    /// A one-to-one relation already holds its child.
    #[error("{parent} already holds its '{child_type}' child")]
    ParentOccupied { parent: Reference, child_type: String },

    #[error("{child} already has a '{parent_type}' parent")]
    AlreadyHasParent { child: Reference, parent_type: String },

    #[error("{entity} already has a '{partner_type}' partner")]
    AlreadyPartnered {
        entity: Reference,
        partner_type: String,
    },

    #[error("{child} has no '{parent_type}' parent")]
    NotLinked { child: Reference, parent_type: String },

    #[error("{entity} has no '{partner_type}' partner")]
    NotPartnered {
        entity: Reference,
        partner_type: String,
    },

    /// Destroying the entity alone would orphan strong dependents.
    #[error("{entity} still holds {count} strong dependent(s)")]
    HasDependents { entity: Reference, count: usize },

    #[error("linking {child} under {parent} would create a cycle")]
    WouldCycle { parent: Reference, child: Reference },

    #[error("{entity} cannot be related to itself")]
    SelfRelation { entity: Reference },

    #[error("'{type_name}' does not declare component '{component}'")]
    ComponentNotDeclared { type_name: String, component: String },
}

/// A [`Reference`] that no live entity answers to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("reference {0} does not resolve to a live entity")]
    Unresolved(Reference),
}

impl From<ResolutionError> for ValidationError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Unresolved(reference) => ValidationError::Unresolved(reference),
        }
    }
}

/// An internal invariant is broken. These are not recoverable by retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("type tag {0:?} is not declared")]
    UnknownType(TypeTag),

    #[error("entity type '{0}' is already declared")]
    DuplicateType(String),

    #[error("duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    /// Component name and Rust type disagree with an earlier registration.
    #[error("component name '{name}' conflicts with an earlier registration")]
    ComponentNameConflict { name: String },

    #[error("could not generate a free name from '{base}' in '{type_name}' after {attempts} attempts")]
    NameExhausted {
        type_name: String,
        base: String,
        attempts: u32,
    },

    #[error("corrupt entity state: {0}")]
    CorruptState(String),
}

/// Any failure of a graph operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl GraphError {
    /// Precondition failures, including unresolved references.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Resolution(_))
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::graph::{Graph, GraphConfig};
    pub use crate::identity::{EntityName, Identity, Reference};
    pub use crate::pack::Pack;
    pub use crate::schema::{Cardinality, ChildDecl, Dependency, EntityTypeDecl, Schema, TypeTag};
    pub use crate::snapshot::{EntitySnapshot, GraphSnapshot};
    pub use crate::state::BinaryState;
    pub use crate::{GraphError, ResolutionError, StructuralError, ValidationError};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        let validation: GraphError = ValidationError::EmptyName.into();
        let resolution: GraphError =
            ResolutionError::Unresolved(Reference::new(TypeTag(0), "gone")).into();
        let structural: GraphError = StructuralError::CorruptState("bad".into()).into();

        assert!(validation.is_validation());
        assert!(resolution.is_validation());
        assert!(structural.is_structural());
        assert!(!structural.is_validation());
    }

    #[test]
    fn error_messages_name_the_entity() {
        let err = ValidationError::HasDependents {
            entity: Reference::new(TypeTag(1), "inbox"),
            count: 2,
        };
        assert_eq!(err.to_string(), "#1:'inbox' still holds 2 strong dependent(s)");

        let err: GraphError = ResolutionError::Unresolved(Reference::new(TypeTag(0), "x")).into();
        assert_eq!(err.to_string(), "reference #0:'x' does not resolve to a live entity");
    }
}
