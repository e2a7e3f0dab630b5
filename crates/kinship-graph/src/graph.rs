//! The [`Graph`]: packs, handles and relation edges behind one API.
//!
//! All mutation goes through `&mut Graph`. Every operation validates first and
//! returns a [`ValidationError`] before touching anything, so a failed call
//! leaves the graph unchanged. Destruction severs relations before the row is
//! swap-removed. A cascade destroys strong descendants leaves first, and each
//! row is looked up again through the slot table right before removal.

use std::collections::HashSet;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::entity::{EntityAllocator, EntityId, Location};
use crate::identity::{EntityName, Identity, NameGenerator, Reference};
use crate::pack::Pack;
use crate::relation::RelationStore;
use crate::schema::{Cardinality, Schema, TypeTag};
use crate::{GraphError, ResolutionError, StructuralError, ValidationError};

// ---------------------------------------------------------------------------
// GraphConfig
// ---------------------------------------------------------------------------

/// Tuning for name generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Placed between a generic base name and its suffix.
    pub suffix_separator: String,
    /// Random suffixes tried after the counter and handle suffixes collide.
    pub random_name_attempts: u32,
    /// Seed for the random suffix generator.
    pub name_seed: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            suffix_separator: "_".to_owned(),
            random_name_attempts: 8,
            name_seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// An entity-relationship graph over a fixed [`Schema`].
///
/// Owns one [`Pack`] per declared type, the slot table that maps handles to
/// rows, every relation edge, and the generator used for generic names.
/// Graphs are independent values; any number can coexist.
#[derive(Debug)]
pub struct Graph {
    pub(crate) schema: Schema,
    config: GraphConfig,
    pub(crate) allocator: EntityAllocator,
    /// Indexed by `TypeTag`.
    pub(crate) packs: Vec<Pack>,
    pub(crate) relations: RelationStore,
    /// Source of random name suffixes, seeded from `GraphConfig::name_seed`.
    rng: Pcg64,
}

impl Graph {
    /// Create an empty graph over `schema` with the default [`GraphConfig`].
    ///
    /// # Errors
    ///
    /// [`StructuralError::CorruptState`] if a type declares a component the
    /// schema's registry does not know.
    pub fn new(schema: Schema) -> Result<Self, StructuralError> {
        Self::with_config(schema, GraphConfig::default())
    }

    /// Create an empty graph with explicit name-generation settings. Builds
    /// one empty pack per declared type.
    pub fn with_config(schema: Schema, config: GraphConfig) -> Result<Self, StructuralError> {
        let packs = schema
            .types()
            .map(|decl| Pack::new(decl, schema.components()))
            .collect::<Result<Vec<_>, _>>()?;
        let rng = Pcg64::seed_from_u64(config.name_seed);
        Ok(Self {
            schema,
            config,
            allocator: EntityAllocator::new(),
            packs,
            relations: RelationStore::new(),
            rng,
        })
    }

    /// The schema this graph was built from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Name-generation settings in effect.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // -- lifecycle ----------------------------------------------------------

    /// Create an entity of type `tag` with default component values.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyName`] / [`ValidationError::NameTaken`] for a
    ///   unique name that cannot be used.
    /// - [`StructuralError::NameExhausted`] if no suffix for a generic name is
    ///   free.
    pub fn create(&mut self, tag: TypeTag, name: &EntityName) -> Result<EntityId, GraphError> {
        let object = self.allocator.peek_next();
        let name = self.claim_name(tag, name, object)?;
        let pack = self.pack_mut(tag)?;
        let row = pack.len();
        let id = self.allocator.allocate(Location { tag, row });
        let pack = self.pack_mut(tag)?;
        pack.add_row(
            id,
            Identity {
                name,
                type_tag: tag,
            },
        );
        tracing::trace!(entity = %id, type_tag = %tag, row, "entity created");
        Ok(id)
    }

    /// Destroy an entity and everything it strongly owns.
    ///
    /// The strong subtree is destroyed leaves first (see
    /// [`strong_subtree`](Self::strong_subtree)). Each member has its weak
    /// children, parents and partners unlinked before its row is
    /// swap-removed.
    ///
    /// # Errors
    ///
    /// [`ValidationError::StaleEntity`] if `id` is not alive.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), GraphError> {
        self.location(id)?;
        for member in self.strong_subtree(id) {
            self.discard(member)?;
        }
        Ok(())
    }

    /// Remove a single entity without cascading. Its strong children, if
    /// any, survive unlinked.
    pub(crate) fn discard(&mut self, id: EntityId) -> Result<(), GraphError> {
        let tag = self.location(id)?.tag;
        self.sever(id, tag)?;

        // Earlier removals in the same cascade may have moved this row.
        let row = self.location(id)?.row;
        let (identity, moved) = self.pack_mut(tag)?.remove_row(row)?;
        if let Some(moved) = moved {
            self.allocator.relocate(moved, row);
        }
        self.allocator.deallocate(id);
        tracing::trace!(entity = %id, type_tag = %tag, name = %identity.name, "entity destroyed");
        Ok(())
    }

    /// Give an entity a new name. Returns the previous name.
    ///
    /// Renaming to the entity's own current unique name succeeds and changes
    /// nothing.
    pub fn rename(&mut self, id: EntityId, name: &EntityName) -> Result<String, GraphError> {
        let location = self.location(id)?;
        let current = self.identity(id).map(|identity| identity.name.clone());
        if let (EntityName::Unique(requested), Some(current)) = (name, current) {
            if *requested == current {
                return Ok(current);
            }
        }
        let new_name = self.claim_name(location.tag, name, id)?;
        let previous = self.pack_mut(location.tag)?.rename_row(location.row, new_name)?;
        Ok(previous)
    }

    /// Remove every edge touching `id`.
    fn sever(&mut self, id: EntityId, tag: TypeTag) -> Result<(), StructuralError> {
        let decl = self.schema.get(tag)?;
        for &parent_type in &decl.parents {
            if let Some(parent) = self.relations.parent(id, parent_type) {
                self.relations.unlink((parent, parent_type), (id, tag));
            }
        }
        for child_decl in &decl.children {
            self.relations.unlink_children((id, tag), child_decl.child);
        }
        for &partner_type in &decl.partners {
            self.relations.unpair((id, tag), partner_type);
        }
        Ok(())
    }

    /// Turn a requested name into a free one within `tag`'s pack.
    fn claim_name(
        &mut self,
        tag: TypeTag,
        requested: &EntityName,
        object: EntityId,
    ) -> Result<String, GraphError> {
        let Self {
            schema,
            config,
            packs,
            rng,
            ..
        } = self;
        let pack = packs
            .get_mut(tag.index())
            .ok_or(StructuralError::UnknownType(tag))?;

        match requested {
            EntityName::Unique(name) => {
                if name.is_empty() {
                    return Err(ValidationError::EmptyName.into());
                }
                if pack.contains_name(name) {
                    return Err(ValidationError::NameTaken {
                        type_name: schema.type_name(tag).to_owned(),
                        name: name.clone(),
                    }
                    .into());
                }
                Ok(name.clone())
            }
            EntityName::Generic(base) => {
                let mut generator = NameGenerator {
                    separator: &config.suffix_separator,
                    random_attempts: config.random_name_attempts,
                    rng,
                };
                pack.generate_name(&mut generator, base, object)
                    .ok_or_else(|| {
                        StructuralError::NameExhausted {
                            type_name: schema.type_name(tag).to_owned(),
                            base: base.clone(),
                            attempts: config.random_name_attempts + 2,
                        }
                        .into()
                    })
            }
        }
    }

    // -- lookup -------------------------------------------------------------

    /// Returns `true` if `id` refers to a live entity. Handles to destroyed
    /// entities stay stale even after their slot is reused.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Number of live entities across all types.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Returns `true` if no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared type of a live entity.
    pub fn type_of(&self, id: EntityId) -> Option<TypeTag> {
        self.allocator.location(id).map(|location| location.tag)
    }

    /// Type and current name of a live entity.
    pub fn identity(&self, id: EntityId) -> Option<&Identity> {
        let location = self.allocator.location(id)?;
        self.packs.get(location.tag.index())?.identity(location.row)
    }

    /// A durable reference to a live entity.
    pub fn reference(&self, id: EntityId) -> Option<Reference> {
        self.identity(id).map(Identity::reference)
    }

    /// Look up a live entity of type `tag` by its exact name.
    pub fn find(&self, tag: TypeTag, name: &str) -> Option<EntityId> {
        self.pack(tag)?.find(name)
    }

    /// Resolve a reference: type tag, then pack, then name.
    pub fn resolve(&self, reference: &Reference) -> Result<EntityId, ResolutionError> {
        self.find(reference.type_tag, &reference.name)
            .ok_or_else(|| ResolutionError::Unresolved(reference.clone()))
    }

    /// Storage for every entity of type `tag`, for read-only iteration over
    /// rows and component columns.
    pub fn pack(&self, tag: TypeTag) -> Option<&Pack> {
        self.packs.get(tag.index())
    }

    /// All packs, in type-tag order.
    pub fn packs(&self) -> impl Iterator<Item = &Pack> {
        self.packs.iter()
    }

    /// Every live entity, pack by pack in row order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Identity)> {
        self.packs.iter().flat_map(Pack::iter)
    }

    /// Pack and row of a live entity.
    pub(crate) fn location(&self, id: EntityId) -> Result<Location, ValidationError> {
        self.allocator
            .location(id)
            .ok_or(ValidationError::StaleEntity(id))
    }

    fn require_reference(&self, id: EntityId) -> Result<Reference, ValidationError> {
        self.reference(id).ok_or(ValidationError::StaleEntity(id))
    }

    fn pack_mut(&mut self, tag: TypeTag) -> Result<&mut Pack, StructuralError> {
        self.packs
            .get_mut(tag.index())
            .ok_or(StructuralError::UnknownType(tag))
    }

    // -- components ---------------------------------------------------------

    /// Read component `T` of a live entity.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::StaleEntity`] if `id` is not alive.
    /// - [`ValidationError::ComponentNotDeclared`] if the entity's type does
    ///   not declare `T`.
    pub fn get<T: Component>(&self, id: EntityId) -> Result<&T, GraphError> {
        let location = self.location(id)?;
        let pack = self
            .pack(location.tag)
            .ok_or(StructuralError::UnknownType(location.tag))?;
        match pack.get::<T>(location.row) {
            Some(value) => Ok(value),
            None => Err(self.component_not_declared::<T>(location.tag).into()),
        }
    }

    /// Mutable access to component `T`. Fails like [`get`](Self::get).
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T, GraphError> {
        let location = self.location(id)?;
        let declared = self
            .pack(location.tag)
            .is_some_and(|pack| pack.has_column::<T>());
        if !declared {
            return Err(self.component_not_declared::<T>(location.tag).into());
        }
        self.pack_mut(location.tag)?
            .get_mut::<T>(location.row)
            .ok_or_else(|| {
                StructuralError::CorruptState(format!(
                    "row {} missing from component column",
                    location.row
                ))
                .into()
            })
    }

    /// Overwrite a component value. Returns the previous value.
    pub fn set<T: Component>(&mut self, id: EntityId, value: T) -> Result<T, GraphError> {
        let slot = self.get_mut::<T>(id)?;
        Ok(std::mem::replace(slot, value))
    }

    fn component_not_declared<T: Component>(&self, tag: TypeTag) -> ValidationError {
        let registry = self.schema.components();
        let component = registry
            .lookup::<T>()
            .map(|id| registry.name_of(id).to_owned())
            .unwrap_or_else(|| std::any::type_name::<T>().to_owned());
        ValidationError::ComponentNotDeclared {
            type_name: self.schema.type_name(tag).to_owned(),
            component,
        }
    }

    // -- parent / child -----------------------------------------------------

    /// Check whether `child` may be linked under `parent` without linking it.
    pub fn check_add_child(&self, parent: EntityId, child: EntityId) -> Result<(), ValidationError> {
        let parent_tag = self.location(parent)?.tag;
        let child_tag = self.location(child)?.tag;
        let decl = self.schema.relation(parent_tag, child_tag).ok_or_else(|| {
            ValidationError::UndeclaredRelation {
                parent: self.schema.type_name(parent_tag).to_owned(),
                child: self.schema.type_name(child_tag).to_owned(),
            }
        })?;

        if parent == child || (self.has_children(child) && self.is_ancestor(child, parent)) {
            return Err(ValidationError::WouldCycle {
                parent: self.require_reference(parent)?,
                child: self.require_reference(child)?,
            });
        }
        if self.relations.parent(child, parent_tag).is_some() {
            return Err(ValidationError::AlreadyHasParent {
                child: self.require_reference(child)?,
                parent_type: self.schema.type_name(parent_tag).to_owned(),
            });
        }
        if decl.cardinality == Cardinality::OneToOne
            && !self.relations.children(parent, child_tag).is_empty()
        {
            return Err(ValidationError::ParentOccupied {
                parent: self.require_reference(parent)?,
                child_type: self.schema.type_name(child_tag).to_owned(),
            });
        }
        Ok(())
    }

    /// Append `child` to `parent`'s children of its type.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), GraphError> {
        self.link_child(parent, child, None)
    }

    /// Link `child` under `parent` at `position` (clamped to the list length).
    pub fn insert_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        position: usize,
    ) -> Result<(), GraphError> {
        self.link_child(parent, child, Some(position))
    }

    fn link_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
        position: Option<usize>,
    ) -> Result<(), GraphError> {
        self.check_add_child(parent, child)?;
        let parent_tag = self.location(parent)?.tag;
        let child_tag = self.location(child)?.tag;
        self.relations
            .link((parent, parent_tag), (child, child_tag), position);
        Ok(())
    }

    /// Unlink `child` from `parent`. Returns the child's former position, or
    /// `None` if they were not linked.
    pub fn remove_child(
        &mut self,
        parent: EntityId,
        child: EntityId,
    ) -> Result<Option<usize>, GraphError> {
        let parent_tag = self.location(parent)?.tag;
        let child_tag = self.location(child)?.tag;
        Ok(self
            .relations
            .unlink((parent, parent_tag), (child, child_tag)))
    }

    /// Unlink `child` from its parent of `parent_type`. Returns the former
    /// parent and the child's position in its list.
    pub fn detach(
        &mut self,
        child: EntityId,
        parent_type: TypeTag,
    ) -> Result<Option<(EntityId, usize)>, GraphError> {
        let child_tag = self.location(child)?.tag;
        let Some(parent) = self.relations.parent(child, parent_type) else {
            return Ok(None);
        };
        Ok(self
            .relations
            .unlink((parent, parent_type), (child, child_tag))
            .map(|position| (parent, position)))
    }

    /// The parent of `child` of type `parent_type`, if linked.
    pub fn parent(&self, child: EntityId, parent_type: TypeTag) -> Option<EntityId> {
        self.relations.parent(child, parent_type)
    }

    /// Whether `child` has a parent of any type.
    pub fn has_parent(&self, child: EntityId) -> bool {
        self.type_of(child)
            .and_then(|tag| self.schema.get(tag).ok())
            .is_some_and(|decl| {
                decl.parents
                    .iter()
                    .any(|&parent_type| self.relations.parent(child, parent_type).is_some())
            })
    }

    /// Children of `parent` with type `child_type`, in insertion order.
    pub fn children(&self, parent: EntityId, child_type: TypeTag) -> &[EntityId] {
        self.relations.children(parent, child_type)
    }

    /// Number of children of type `child_type` under `parent`.
    pub fn child_count(&self, parent: EntityId, child_type: TypeTag) -> usize {
        self.children(parent, child_type).len()
    }

    /// Visit the strong children of `id`: relations in declaration order,
    /// children in insertion order.
    pub fn for_each_dependent_child(&self, id: EntityId, mut f: impl FnMut(EntityId)) {
        let Some(decl) = self.type_of(id).and_then(|tag| self.schema.get(tag).ok()) else {
            return;
        };
        for child_decl in decl.strong_children() {
            for &child in self.relations.children(id, child_decl.child) {
                f(child);
            }
        }
    }

    /// `root` and its strong descendants in post-order: every entity comes
    /// after all of its strong children and `root` comes last.
    ///
    /// Siblings are listed last-first, so removing them in this order always
    /// takes the tail of the parent's child list. An entity owned by more
    /// than one member appears once. The walk uses an explicit stack and
    /// handles chains of any depth. Returns an empty list for a dead `root`.
    pub fn strong_subtree(&self, root: EntityId) -> Vec<EntityId> {
        let mut order = Vec::new();
        if !self.is_alive(root) {
            return order;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            self.for_each_dependent_child(id, |child| {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            });
        }
        order
    }

    /// Number of strong children `id` holds.
    pub fn dependent_count(&self, id: EntityId) -> usize {
        let mut count = 0;
        self.for_each_dependent_child(id, |_| count += 1);
        count
    }

    /// Whether `id` holds a child of any type. An entity without children
    /// cannot be anyone's ancestor.
    fn has_children(&self, id: EntityId) -> bool {
        self.type_of(id)
            .and_then(|tag| self.schema.get(tag).ok())
            .is_some_and(|decl| {
                decl.children
                    .iter()
                    .any(|child_decl| !self.relations.children(id, child_decl.child).is_empty())
            })
    }

    /// Whether `candidate` appears among the ancestors of `of`, following
    /// parents of every declared type.
    fn is_ancestor(&self, candidate: EntityId, of: EntityId) -> bool {
        let mut stack = vec![of];
        while let Some(current) = stack.pop() {
            let Some(decl) = self.type_of(current).and_then(|tag| self.schema.get(tag).ok())
            else {
                continue;
            };
            for &parent_type in &decl.parents {
                if let Some(parent) = self.relations.parent(current, parent_type) {
                    if parent == candidate {
                        return true;
                    }
                    stack.push(parent);
                }
            }
        }
        false
    }

    // -- partners -----------------------------------------------------------

    /// Check whether `a` and `b` may be partnered without linking them.
    ///
    /// Rejects a self-pairing, an undeclared type pair, and either side
    /// already holding a partner of the other's type.
    pub fn check_add_partner(&self, a: EntityId, b: EntityId) -> Result<(), ValidationError> {
        let a_tag = self.location(a)?.tag;
        let b_tag = self.location(b)?.tag;
        if a == b {
            return Err(ValidationError::SelfRelation {
                entity: self.require_reference(a)?,
            });
        }
        if !self.schema.are_partners(a_tag, b_tag) {
            return Err(ValidationError::UndeclaredPartner {
                first: self.schema.type_name(a_tag).to_owned(),
                second: self.schema.type_name(b_tag).to_owned(),
            });
        }
        for (entity, partner_type) in [(a, b_tag), (b, a_tag)] {
            if self.relations.partner(entity, partner_type).is_some() {
                return Err(ValidationError::AlreadyPartnered {
                    entity: self.require_reference(entity)?,
                    partner_type: self.schema.type_name(partner_type).to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Link `a` and `b` as partners, symmetrically.
    pub fn add_partner(&mut self, a: EntityId, b: EntityId) -> Result<(), GraphError> {
        self.check_add_partner(a, b)?;
        let a_tag = self.location(a)?.tag;
        let b_tag = self.location(b)?.tag;
        self.relations.pair((a, a_tag), (b, b_tag));
        Ok(())
    }

    /// Break the partner edge of `entity` towards `partner_type`. Returns the
    /// former partner, or `None` if there was none.
    pub fn remove_partner(
        &mut self,
        entity: EntityId,
        partner_type: TypeTag,
    ) -> Result<Option<EntityId>, GraphError> {
        let tag = self.location(entity)?.tag;
        Ok(self.relations.unpair((entity, tag), partner_type))
    }

    /// The partner of `entity` of type `partner_type`, if any.
    pub fn partner(&self, entity: EntityId, partner_type: TypeTag) -> Option<EntityId> {
        self.relations.partner(entity, partner_type)
    }

    /// Whether `entity` has a partner of any type.
    pub fn has_partner(&self, entity: EntityId) -> bool {
        self.type_of(entity)
            .and_then(|tag| self.schema.get(tag).ok())
            .is_some_and(|decl| {
                decl.partners
                    .iter()
                    .any(|&partner_type| self.relations.partner(entity, partner_type).is_some())
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
