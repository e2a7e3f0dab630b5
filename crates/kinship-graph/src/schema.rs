//! Runtime schema: entity types, their components and their relations.
//!
//! A [`Schema`] is built once, before the [`Graph`](crate::graph::Graph) that
//! uses it. Each declared entity type gets a [`TypeTag`] and an
//! [`EntityTypeDecl`] listing, in declaration order:
//!
//! - its component columns,
//! - the parent types it may be adopted by,
//! - the child types it may hold, with [`Cardinality`] and [`Dependency`],
//! - the partner types it may be involved with.
//!
//! Declaration order is significant: entity snapshots are written and read in
//! exactly this order.
//!
//! ```
//! use kinship_graph::prelude::*;
//!
//! #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
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
//! assert_eq!(schema.get(note).unwrap().parents, vec![folder]);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentRegistry, ComponentTypeId};
use crate::StructuralError;

// ---------------------------------------------------------------------------
// TypeTag
// ---------------------------------------------------------------------------

/// Identifies a declared entity type. Indexes the graph's packs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub(crate) u32);

impl TypeTag {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Relation declarations
// ---------------------------------------------------------------------------

/// How many children a parent may hold under one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    /// Children are kept in insertion order.
    OneToMany,
}

/// Whether a child is destroyed along with its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependency {
    /// The child survives; it is only unlinked.
    Weak,
    /// The child is destroyed, recursively, before the parent.
    Strong,
}

/// A child relation declared on a parent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildDecl {
    pub child: TypeTag,
    pub cardinality: Cardinality,
    pub dependency: Dependency,
}

/// Everything declared about one entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeDecl {
    pub tag: TypeTag,
    pub name: String,
    pub components: Vec<ComponentTypeId>,
    pub parents: Vec<TypeTag>,
    pub children: Vec<ChildDecl>,
    pub partners: Vec<TypeTag>,
}

impl EntityTypeDecl {
    pub fn child(&self, child: TypeTag) -> Option<&ChildDecl> {
        self.children.iter().find(|decl| decl.child == child)
    }

    /// Column position of a component within this type's pack.
    pub fn component_index(&self, id: ComponentTypeId) -> Option<usize> {
        self.components.iter().position(|c| *c == id)
    }

    /// Child relations whose children are destroyed with this type.
    pub fn strong_children(&self) -> impl Iterator<Item = &ChildDecl> {
        self.children
            .iter()
            .filter(|decl| decl.dependency == Dependency::Strong)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The registration table for every entity type a graph can store.
#[derive(Debug, Default)]
pub struct Schema {
    types: Vec<EntityTypeDecl>,
    by_name: HashMap<String, TypeTag>,
    components: ComponentRegistry,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new entity type.
    ///
    /// # Errors
    ///
    /// [`StructuralError::DuplicateType`] if the name is already declared.
    pub fn declare_type(&mut self, name: &str) -> Result<TypeTag, StructuralError> {
        if self.by_name.contains_key(name) {
            return Err(StructuralError::DuplicateType(name.to_owned()));
        }
        let tag = TypeTag(self.types.len() as u32);
        self.types.push(EntityTypeDecl {
            tag,
            name: name.to_owned(),
            components: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            partners: Vec::new(),
        });
        self.by_name.insert(name.to_owned(), tag);
        Ok(tag)
    }

    /// Add a component column to an entity type. The component is registered
    /// in the shared [`ComponentRegistry`] on first use.
    pub fn add_component<T: Component>(
        &mut self,
        tag: TypeTag,
        name: &str,
    ) -> Result<ComponentTypeId, StructuralError> {
        self.get(tag)?;
        let id = self.components.register::<T>(name)?;
        let decl = &mut self.types[tag.index()];
        if decl.components.contains(&id) {
            return Err(StructuralError::DuplicateDeclaration(format!(
                "component '{name}' on '{}'",
                decl.name
            )));
        }
        decl.components.push(id);
        Ok(id)
    }

    /// Declare that `parent` may hold children of type `child`.
    pub fn declare_child(
        &mut self,
        parent: TypeTag,
        child: TypeTag,
        cardinality: Cardinality,
        dependency: Dependency,
    ) -> Result<(), StructuralError> {
        self.get(parent)?;
        self.get(child)?;
        if self.relation(parent, child).is_some() {
            return Err(StructuralError::DuplicateDeclaration(format!(
                "relation '{}' -> '{}'",
                self.type_name(parent),
                self.type_name(child)
            )));
        }
        self.types[parent.index()].children.push(ChildDecl {
            child,
            cardinality,
            dependency,
        });
        self.types[child.index()].parents.push(parent);
        Ok(())
    }

    /// Declare a symmetric partner relation between `a` and `b`.
    pub fn declare_partner(&mut self, a: TypeTag, b: TypeTag) -> Result<(), StructuralError> {
        self.get(a)?;
        self.get(b)?;
        if self.are_partners(a, b) {
            return Err(StructuralError::DuplicateDeclaration(format!(
                "partners '{}' <-> '{}'",
                self.type_name(a),
                self.type_name(b)
            )));
        }
        self.types[a.index()].partners.push(b);
        if a != b {
            self.types[b.index()].partners.push(a);
        }
        Ok(())
    }

    /// Look up a declared type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, tag: TypeTag) -> Result<&EntityTypeDecl, StructuralError> {
        self.types
            .get(tag.index())
            .ok_or(StructuralError::UnknownType(tag))
    }

    /// Declared name of a type, or `"<undeclared>"`.
    pub fn type_name(&self, tag: TypeTag) -> &str {
        self.types
            .get(tag.index())
            .map(|decl| decl.name.as_str())
            .unwrap_or("<undeclared>")
    }

    /// The relation declared between `parent` and `child`, if any.
    pub fn relation(&self, parent: TypeTag, child: TypeTag) -> Option<&ChildDecl> {
        self.types.get(parent.index())?.child(child)
    }

    pub fn are_partners(&self, a: TypeTag, b: TypeTag) -> bool {
        self.types
            .get(a.index())
            .is_some_and(|decl| decl.partners.contains(&b))
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityTypeDecl> {
        self.types.iter()
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Number of declared entity types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
