//! Per-type entity storage.
//!
//! A [`Pack`] stores every entity of one declared type in a Structure-of-Arrays
//! layout: a dense identity array, a parallel [`EntityId`] array, and one
//! column per declared component. Every column is kept the same length as the
//! identity array. Destroying a row swaps the last row into its place on all
//! arrays at once, so removal is O(1) and relocates at most one other entity.

use std::collections::HashMap;

use crate::component::{ColumnStorage, Component, ComponentRegistry, ComponentTypeId, TypedColumn};
use crate::entity::EntityId;
use crate::identity::{Identity, NameGenerator};
use crate::schema::{EntityTypeDecl, TypeTag};
use crate::state::BinaryState;
use crate::StructuralError;

/// Dense storage for all entities of a single type.
#[derive(Debug)]
pub struct Pack {
    tag: TypeTag,
    identities: Vec<Identity>,
    /// Parallel to `identities`.
    entities: Vec<EntityId>,
    by_name: HashMap<String, EntityId>,
    /// Next suffix for generic names. Never decreases.
    counter: u64,
    /// One column per declared component, in declaration order.
    columns: Vec<(ComponentTypeId, Box<dyn ColumnStorage>)>,
}

impl Pack {
    /// Create an empty pack with one column per component declared on `decl`.
    pub fn new(decl: &EntityTypeDecl, registry: &ComponentRegistry) -> Result<Self, StructuralError> {
        let columns = decl
            .components
            .iter()
            .map(|&id| {
                let info = registry.get_info(id).ok_or_else(|| {
                    StructuralError::CorruptState(format!(
                        "type '{}' declares unregistered component {id:?}",
                        decl.name
                    ))
                })?;
                Ok((id, (info.vtable.new_column)()))
            })
            .collect::<Result<Vec<_>, StructuralError>>()?;

        Ok(Self {
            tag: decl.tag,
            identities: Vec::new(),
            entities: Vec::new(),
            by_name: HashMap::new(),
            counter: 0,
            columns,
        })
    }

    /// The declared type every row in this pack belongs to.
    #[inline]
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Number of live rows (entities) in this pack.
    #[inline]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Returns `true` if the pack holds no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Look up a live entity of this type by name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Whether `name` is taken by a live entity of this type.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Identity stored at `row`, or `None` if the row is out of bounds.
    pub fn identity(&self, row: usize) -> Option<&Identity> {
        self.identities.get(row)
    }

    /// Handle of the entity stored at `row`.
    pub fn entity(&self, row: usize) -> Option<EntityId> {
        self.entities.get(row).copied()
    }

    /// All live entity handles, in row order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Iterate `(handle, identity)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Identity)> {
        self.entities.iter().copied().zip(self.identities.iter())
    }

    /// Contiguous read-only view of a component column, or `None` if this
    /// type does not declare `T`.
    pub fn column<T: Component>(&self) -> Option<&[T]> {
        self.columns
            .iter()
            .find_map(|(_, column)| column.as_any().downcast_ref::<TypedColumn<T>>())
            .map(TypedColumn::as_slice)
    }

    /// Component `T` at `row`. `None` if `T` is not declared on this type or
    /// the row is out of bounds.
    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.columns
            .iter()
            .find_map(|(_, column)| column.as_any().downcast_ref::<TypedColumn<T>>())?
            .get(row)
    }

    /// Mutable access to component `T` at `row`.
    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.columns
            .iter_mut()
            .find_map(|(_, column)| column.as_any_mut().downcast_mut::<TypedColumn<T>>())?
            .get_mut(row)
    }

    /// Whether this type declares a column of `T`.
    pub fn has_column<T: Component>(&self) -> bool {
        self.column::<T>().is_some()
    }

    // -- structural mutation ------------------------------------------------

    /// Append a row for `id`, default-initialising every column. Returns the
    /// new row index.
    pub(crate) fn add_row(&mut self, id: EntityId, identity: Identity) -> usize {
        let row = self.identities.len();
        self.by_name.insert(identity.name.clone(), id);
        self.identities.push(identity);
        self.entities.push(id);
        for (_, column) in &mut self.columns {
            column.push_default();
        }
        row
    }

    /// Swap-remove `row` on every array. Returns the removed identity and the
    /// handle of the entity that moved into `row`, if any.
    ///
    /// The caller must relocate the moved entity in the slot table; the pack
    /// does not know about handles beyond its own rows.
    pub(crate) fn remove_row(
        &mut self,
        row: usize,
    ) -> Result<(Identity, Option<EntityId>), StructuralError> {
        if row >= self.identities.len() {
            return Err(StructuralError::CorruptState(format!(
                "row {row} out of bounds for pack {} of {} rows",
                self.tag,
                self.identities.len()
            )));
        }
        let identity = self.identities.swap_remove(row);
        self.entities.swap_remove(row);
        for (_, column) in &mut self.columns {
            column.swap_remove(row);
        }
        self.by_name.remove(&identity.name);
        Ok((identity, self.entities.get(row).copied()))
    }

    /// Replace the name stored at `row`. Returns the previous name.
    pub(crate) fn rename_row(&mut self, row: usize, name: String) -> Result<String, StructuralError> {
        let (identity, id) = match (self.identities.get_mut(row), self.entities.get(row)) {
            (Some(identity), Some(&id)) => (identity, id),
            _ => {
                return Err(StructuralError::CorruptState(format!(
                    "rename of row {row} out of bounds for pack {}",
                    self.tag
                )))
            }
        };
        self.by_name.remove(&identity.name);
        self.by_name.insert(name.clone(), id);
        Ok(std::mem::replace(&mut identity.name, name))
    }

    /// Generate a free name from `base` using this pack's suffix counter.
    ///
    /// Returns `None` when every candidate the generator tries is taken.
    /// The counter still advances, so a later call starts from a fresh
    /// suffix.
    pub(crate) fn generate_name(
        &mut self,
        generator: &mut NameGenerator<'_>,
        base: &str,
        object: EntityId,
    ) -> Option<String> {
        let Self {
            counter, by_name, ..
        } = self;
        generator.generate(base, counter, object, |candidate| {
            !by_name.contains_key(candidate)
        })
    }

    // -- state --------------------------------------------------------------

    /// Write every component value at `row`, in declaration order.
    pub(crate) fn encode_components(
        &self,
        row: usize,
        out: &mut BinaryState,
    ) -> Result<(), StructuralError> {
        for (_, column) in &self.columns {
            column.encode_row(row, out)?;
        }
        Ok(())
    }

    /// Overwrite every component value at `row` from `input`, in declaration
    /// order.
    pub(crate) fn decode_components(
        &mut self,
        row: usize,
        input: &mut BinaryState,
    ) -> Result<(), StructuralError> {
        for (_, column) in &mut self.columns {
            column.decode_row(row, input)?;
        }
        Ok(())
    }

    /// Component values at `row` rendered as JSON, keyed by column.
    pub(crate) fn component_values(
        &self,
        row: usize,
    ) -> impl Iterator<Item = (ComponentTypeId, serde_json::Value)> + '_ {
        self.columns
            .iter()
            .map(move |(id, column)| (*id, column.to_json(row)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
