//! Entity state capture and restore, plus whole-graph debug snapshots.
//!
//! [`Graph::capture_entity`] writes one entity into a [`BinaryState`] in a
//! fixed order derived from its type declaration:
//!
//! 1. every component value, in declaration order;
//! 2. for each declared parent type, the parent reference (or none) and, when
//!    present, the entity's position in that parent's child list;
//! 3. for each declared child relation, a count followed by one reference per
//!    child;
//! 4. for each declared partner type, the partner reference (or none).
//!
//! [`Graph::restore_entity`] reads the same layout back. Relation edges are
//! re-resolved by name; an edge whose other end is gone or no longer accepts
//! the link is logged and skipped.
//!
//! [`GraphSnapshot`] is a name-based, order-independent view of the whole
//! graph, used to compare observable state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::graph::Graph;
use crate::identity::{EntityName, Reference};
use crate::state::BinaryState;
use crate::{GraphError, StructuralError};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One entity, with its edges expressed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub type_name: String,
    pub name: String,
    /// Component name to JSON value.
    pub components: BTreeMap<String, serde_json::Value>,
    /// Parent type name to parent name.
    pub parents: BTreeMap<String, String>,
    /// Child type name to child names, in list order.
    pub children: BTreeMap<String, Vec<String>>,
    /// Partner type name to partner name.
    pub partners: BTreeMap<String, String>,
}

/// Every live entity, sorted by type name then entity name.
///
/// Two graphs with equal snapshots are observably identical, regardless of
/// row order or handle generations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<EntitySnapshot>,
}

impl GraphSnapshot {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, type_name: &str, name: &str) -> Option<&EntitySnapshot> {
        self.entities
            .iter()
            .find(|e| e.type_name == type_name && e.name == name)
    }
}

// ---------------------------------------------------------------------------
// Graph capture / restore
// ---------------------------------------------------------------------------

impl Graph {
    /// Write the full state of `id` (components and edges) into `out`.
    pub fn capture_entity(&self, id: EntityId, out: &mut BinaryState) -> Result<(), GraphError> {
        let location = self.location(id)?;
        let decl = self.schema.get(location.tag)?;
        let pack = self
            .pack(location.tag)
            .ok_or(StructuralError::UnknownType(location.tag))?;
        pack.encode_components(location.row, out)?;

        for &parent_type in &decl.parents {
            match self.relations.parent(id, parent_type) {
                Some(parent) => {
                    out.write_reference(self.reference(parent).as_ref());
                    let position = self
                        .relations
                        .children(parent, location.tag)
                        .iter()
                        .rposition(|&child| child == id)
                        .unwrap_or(0);
                    out.write_len(position);
                }
                None => out.write_reference(None),
            }
        }

        for child_decl in &decl.children {
            let children = self.relations.children(id, child_decl.child);
            out.write_len(children.len());
            for &child in children {
                out.write_reference(self.reference(child).as_ref());
            }
        }

        for &partner_type in &decl.partners {
            let partner = self.relations.partner(id, partner_type);
            out.write_reference(partner.and_then(|p| self.reference(p)).as_ref());
        }
        Ok(())
    }

    /// Recreate the entity named by `reference` from state written by
    /// [`capture_entity`](Self::capture_entity).
    ///
    /// Decoding failures are fatal: the half-built entity is discarded and
    /// the error returned. The discard does not cascade, so children already
    /// re-linked to it stay alive. Edges are best-effort.
    pub fn restore_entity(
        &mut self,
        reference: &Reference,
        input: &mut BinaryState,
    ) -> Result<EntityId, GraphError> {
        let id = self.create(
            reference.type_tag,
            &EntityName::Unique(reference.name.clone()),
        )?;
        match self.read_entity_state(id, input) {
            Ok(()) => Ok(id),
            Err(err) => {
                if let Err(cleanup) = self.discard(id) {
                    tracing::error!(
                        entity = %reference,
                        error = %cleanup,
                        "failed to discard partially restored entity"
                    );
                }
                Err(err)
            }
        }
    }

    fn read_entity_state(&mut self, id: EntityId, input: &mut BinaryState) -> Result<(), GraphError> {
        let location = self.location(id)?;
        let decl = self.schema.get(location.tag)?.clone();
        self.packs
            .get_mut(location.tag.index())
            .ok_or(StructuralError::UnknownType(location.tag))?
            .decode_components(location.row, input)?;

        for _ in &decl.parents {
            if let Some(parent) = input.read_reference()? {
                let position = input.read_len()?;
                self.relink(id, &parent, "parent", |graph, parent| {
                    graph.insert_child(parent, id, position)
                })?;
            }
        }

        for _ in &decl.children {
            let count = input.read_len()?;
            for _ in 0..count {
                if let Some(child) = input.read_reference()? {
                    self.relink(id, &child, "child", |graph, child| {
                        graph.add_child(id, child)
                    })?;
                }
            }
        }

        for _ in &decl.partners {
            if let Some(partner) = input.read_reference()? {
                self.relink(id, &partner, "partner", |graph, partner| {
                    graph.add_partner(id, partner)
                })?;
            }
        }
        Ok(())
    }

    /// Resolve `target` and apply `link`. Validation failures are logged and
    /// the edge is left absent; structural failures propagate.
    fn relink(
        &mut self,
        id: EntityId,
        target: &Reference,
        edge: &'static str,
        link: impl FnOnce(&mut Self, EntityId) -> Result<(), GraphError>,
    ) -> Result<(), GraphError> {
        let other = match self.resolve(target) {
            Ok(other) => other,
            Err(err) => {
                tracing::warn!(entity = %id, target = %target, edge, error = %err, "edge not restored");
                return Ok(());
            }
        };
        match link(self, other) {
            Ok(()) => Ok(()),
            Err(err) if err.is_structural() => Err(err),
            Err(err) => {
                tracing::warn!(entity = %id, target = %target, edge, error = %err, "edge not restored");
                Ok(())
            }
        }
    }

    // -- debug snapshot -----------------------------------------------------

    /// Capture the observable state of every live entity.
    pub fn snapshot(&self) -> GraphSnapshot {
        let registry = self.schema.components();
        let name_of = |id: EntityId| {
            self.identity(id)
                .map(|identity| identity.name.clone())
                .unwrap_or_default()
        };

        let mut entities = Vec::with_capacity(self.len());
        for decl in self.schema.types() {
            let Some(pack) = self.pack(decl.tag) else {
                continue;
            };
            for (row, (id, identity)) in pack.iter().enumerate() {
                let components = pack
                    .component_values(row)
                    .map(|(component, value)| (registry.name_of(component).to_owned(), value))
                    .collect();

                let parents = decl
                    .parents
                    .iter()
                    .filter_map(|&parent_type| {
                        let parent = self.relations.parent(id, parent_type)?;
                        Some((self.schema.type_name(parent_type).to_owned(), name_of(parent)))
                    })
                    .collect();

                let children = decl
                    .children
                    .iter()
                    .filter_map(|child_decl| {
                        let children = self.relations.children(id, child_decl.child);
                        if children.is_empty() {
                            return None;
                        }
                        Some((
                            self.schema.type_name(child_decl.child).to_owned(),
                            children.iter().map(|&child| name_of(child)).collect(),
                        ))
                    })
                    .collect();

                let partners = decl
                    .partners
                    .iter()
                    .filter_map(|&partner_type| {
                        let partner = self.relations.partner(id, partner_type)?;
                        Some((self.schema.type_name(partner_type).to_owned(), name_of(partner)))
                    })
                    .collect();

                entities.push(EntitySnapshot {
                    type_name: decl.name.clone(),
                    name: identity.name.clone(),
                    components,
                    parents,
                    children,
                    partners,
                });
            }
        }

        entities.sort_by(|a, b| (&a.type_name, &a.name).cmp(&(&b.type_name, &b.name)));
        GraphSnapshot { entities }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, Dependency, Schema, TypeTag};

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Title(String);

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Pinned(bool);

    struct Fixture {
        graph: Graph,
        folder: TypeTag,
        note: TypeTag,
        author: TypeTag,
    }

    fn fixture() -> Fixture {
        let mut schema = Schema::new();
        let folder = schema.declare_type("Folder").unwrap();
        let note = schema.declare_type("Note").unwrap();
        let author = schema.declare_type("Author").unwrap();
        schema.add_component::<Title>(note, "title").unwrap();
        schema.add_component::<Pinned>(note, "pinned").unwrap();
        schema
            .declare_child(folder, note, Cardinality::OneToMany, Dependency::Weak)
            .unwrap();
        schema.declare_partner(note, author).unwrap();
        Fixture {
            graph: Graph::new(schema).unwrap(),
            folder,
            note,
            author,
        }
    }

    fn unique(name: &str) -> EntityName {
        EntityName::unique(name)
    }

    #[test]
    fn capture_then_restore_reproduces_entity() {
        let mut f = fixture();
        let inbox = f.graph.create(f.folder, &unique("inbox")).unwrap();
        let first = f.graph.create(f.note, &unique("first")).unwrap();
        let second = f.graph.create(f.note, &unique("second")).unwrap();
        let ada = f.graph.create(f.author, &unique("ada")).unwrap();
        f.graph.add_child(inbox, first).unwrap();
        f.graph.add_child(inbox, second).unwrap();
        f.graph.add_partner(first, ada).unwrap();
        f.graph.set(first, Title("hello".into())).unwrap();
        f.graph.set(first, Pinned(true)).unwrap();
        let before = f.graph.snapshot();

        let reference = f.graph.reference(first).unwrap();
        let mut state = BinaryState::new();
        f.graph.capture_entity(first, &mut state).unwrap();
        f.graph.destroy(first).unwrap();
        assert_ne!(f.graph.snapshot(), before);

        let restored = f.graph.restore_entity(&reference, &mut state).unwrap();
        assert_eq!(state.remaining(), 0);
        assert_eq!(f.graph.snapshot(), before);
        assert_eq!(f.graph.children(inbox, f.note), &[restored, second]);
        assert_eq!(f.graph.partner(ada, f.note), Some(restored));
    }

    #[test]
    fn restore_skips_unresolved_edges() {
        let mut f = fixture();
        let inbox = f.graph.create(f.folder, &unique("inbox")).unwrap();
        let note = f.graph.create(f.note, &unique("n")).unwrap();
        f.graph.add_child(inbox, note).unwrap();

        let reference = f.graph.reference(note).unwrap();
        let mut state = BinaryState::new();
        f.graph.capture_entity(note, &mut state).unwrap();
        f.graph.destroy(note).unwrap();
        f.graph.destroy(inbox).unwrap();

        let restored = f.graph.restore_entity(&reference, &mut state).unwrap();
        assert!(f.graph.is_alive(restored));
        assert!(!f.graph.has_parent(restored));
    }

    #[test]
    fn corrupt_state_discards_entity() {
        let mut f = fixture();
        let mut state = BinaryState::new();
        state.write_u8(9);
        let reference = Reference::new(f.note, "broken");
        let err = f.graph.restore_entity(&reference, &mut state).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(f.graph.find(f.note, "broken"), None);
        assert!(f.graph.is_empty());
    }

    #[test]
    fn failed_restore_keeps_relinked_children() {
        let mut schema = Schema::new();
        let folder = schema.declare_type("Folder").unwrap();
        let note = schema.declare_type("Note").unwrap();
        schema
            .declare_child(folder, note, Cardinality::OneToMany, Dependency::Strong)
            .unwrap();
        let mut graph = Graph::new(schema).unwrap();
        let kept = graph.create(note, &unique("kept")).unwrap();

        // Two children announced, only one written.
        let mut state = BinaryState::new();
        state.write_len(2);
        state.write_reference(Some(&Reference::new(note, "kept")));

        let err = graph
            .restore_entity(&Reference::new(folder, "inbox"), &mut state)
            .unwrap_err();
        assert!(err.is_structural());
        assert_eq!(graph.find(folder, "inbox"), None);
        assert!(graph.is_alive(kept));
        assert!(!graph.has_parent(kept));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted_and_name_based() {
        let mut f = fixture();
        let b = f.graph.create(f.note, &unique("b")).unwrap();
        f.graph.create(f.note, &unique("a")).unwrap();
        let inbox = f.graph.create(f.folder, &unique("inbox")).unwrap();
        f.graph.add_child(inbox, b).unwrap();

        let snapshot = f.graph.snapshot();
        let names: Vec<(&str, &str)> = snapshot
            .entities
            .iter()
            .map(|e| (e.type_name.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(names, vec![("Folder", "inbox"), ("Note", "a"), ("Note", "b")]);

        let note = snapshot.get("Note", "b").unwrap();
        assert_eq!(note.parents.get("Folder").map(String::as_str), Some("inbox"));
        assert_eq!(note.components["title"], serde_json::json!(""));
        assert_eq!(
            snapshot.get("Folder", "inbox").unwrap().children["Note"],
            vec!["b".to_owned()]
        );
    }
}
