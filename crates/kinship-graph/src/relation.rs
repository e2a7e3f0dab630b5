//! Relation edges with indices in both directions.
//!
//! Edges live outside the entity records and are keyed by [`EntityId`] plus
//! the type on the *other* end of the edge:
//!
//! - parents: `(child, parent type) -> parent`
//! - children: `(parent, child type) -> [child, ...]`, in insertion order
//! - partners: `(entity, partner type) -> partner`, stored on both sides
//!
//! The store performs no schema validation; [`Graph`](crate::graph::Graph)
//! checks cardinality and declarations before calling in here.

use std::collections::HashMap;

use crate::entity::EntityId;
use crate::schema::TypeTag;

#[derive(Debug, Default)]
pub struct RelationStore {
    parents: HashMap<(EntityId, TypeTag), EntityId>,
    children: HashMap<(EntityId, TypeTag), Vec<EntityId>>,
    partners: HashMap<(EntityId, TypeTag), EntityId>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- parent / child ---------------------------------------------------

    pub fn parent(&self, child: EntityId, parent_type: TypeTag) -> Option<EntityId> {
        self.parents.get(&(child, parent_type)).copied()
    }

    /// Children of `parent` with type `child_type`, in insertion order.
    pub fn children(&self, parent: EntityId, child_type: TypeTag) -> &[EntityId] {
        self.children
            .get(&(parent, child_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Link `child` under `parent`. `position` is clamped to the list length;
    /// `None` appends.
    pub fn link(
        &mut self,
        parent: (EntityId, TypeTag),
        child: (EntityId, TypeTag),
        position: Option<usize>,
    ) {
        let list = self.children.entry((parent.0, child.1)).or_default();
        let at = position.map_or(list.len(), |p| p.min(list.len()));
        list.insert(at, child.0);
        self.parents.insert((child.0, parent.1), parent.0);
    }

    /// Remove the edge between `parent` and `child`. Returns the child's
    /// former position, or `None` if they were not linked.
    pub fn unlink(
        &mut self,
        parent: (EntityId, TypeTag),
        child: (EntityId, TypeTag),
    ) -> Option<usize> {
        if self.parent(child.0, parent.1) != Some(parent.0) {
            return None;
        }
        self.parents.remove(&(child.0, parent.1));
        let key = (parent.0, child.1);
        let list = self.children.get_mut(&key)?;
        // Cascades unlink siblings last-first, so search from the tail.
        let position = list.iter().rposition(|&c| c == child.0)?;
        list.remove(position);
        if list.is_empty() {
            self.children.remove(&key);
        }
        Some(position)
    }

    /// Unlink every child of `child_type` from `parent`. Returns the former
    /// children in order.
    pub fn unlink_children(
        &mut self,
        parent: (EntityId, TypeTag),
        child_type: TypeTag,
    ) -> Vec<EntityId> {
        let children = self
            .children
            .remove(&(parent.0, child_type))
            .unwrap_or_default();
        for child in &children {
            self.parents.remove(&(*child, parent.1));
        }
        children
    }

    // -- partners ---------------------------------------------------------

    pub fn partner(&self, entity: EntityId, partner_type: TypeTag) -> Option<EntityId> {
        self.partners.get(&(entity, partner_type)).copied()
    }

    pub fn pair(&mut self, a: (EntityId, TypeTag), b: (EntityId, TypeTag)) {
        self.partners.insert((a.0, b.1), b.0);
        self.partners.insert((b.0, a.1), a.0);
    }

    /// Break the partner edge of `entity` towards `partner_type`, on both
    /// sides. Returns the former partner.
    pub fn unpair(
        &mut self,
        entity: (EntityId, TypeTag),
        partner_type: TypeTag,
    ) -> Option<EntityId> {
        let partner = self.partners.remove(&(entity.0, partner_type))?;
        self.partners.remove(&(partner, entity.1));
        Some(partner)
    }

    /// Total number of parent/child and partner edges.
    pub fn edge_count(&self) -> usize {
        self.parents.len() + self.partners.len() / 2
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
