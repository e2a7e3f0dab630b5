//! Component type registration and type-erased column storage.
//!
//! Every component used by an entity type must be registered in the schema's
//! [`ComponentRegistry`]. Registration produces a [`ComponentTypeId`] plus a
//! [`ComponentVtable`] of plain function pointers that lets a
//! [`Pack`](crate::pack::Pack) build a column for the type without knowing it
//! at compile time.
//!
//! Columns are stored as `Box<dyn ColumnStorage>` backed by a `Vec<T>`, so the
//! crate stays free of `unsafe`; typed access goes through `Any` downcasts.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::state::BinaryState;
use crate::StructuralError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can live in a component column.
///
/// Rows are created with `Default::default()`, snapshotted through `serde`
/// into a [`BinaryState`], and rendered as JSON for debug snapshots.
pub trait Component:
    Clone + Default + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Component for T where
    T: Clone + Default + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ColumnStorage
// ---------------------------------------------------------------------------

/// Type-erased operations on one component column.
///
/// Every method that takes a `row` expects it to be in bounds; the owning
/// pack keeps all columns the same length as its identity array.
pub trait ColumnStorage: Send + Sync + fmt::Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a default-initialised row.
    fn push_default(&mut self);

    /// Swap-remove `row`, moving the last row into its place.
    fn swap_remove(&mut self, row: usize);

    /// Write the value at `row` into `out`.
    fn encode_row(&self, row: usize, out: &mut BinaryState) -> Result<(), StructuralError>;

    /// Overwrite the value at `row` with the next value read from `input`.
    fn decode_row(&mut self, row: usize, input: &mut BinaryState) -> Result<(), StructuralError>;

    /// Render the value at `row` as JSON.
    fn to_json(&self, row: usize) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A column holding values of a single concrete component type.
#[derive(Debug)]
pub struct TypedColumn<T: Component> {
    values: Vec<T>,
}

impl<T: Component> TypedColumn<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&T> {
        self.values.get(row)
    }

    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        self.values.get_mut(row)
    }
}

impl<T: Component> Default for TypedColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ColumnStorage for TypedColumn<T> {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn push_default(&mut self) {
        self.values.push(T::default());
    }

    fn swap_remove(&mut self, row: usize) {
        self.values.swap_remove(row);
    }

    fn encode_row(&self, row: usize, out: &mut BinaryState) -> Result<(), StructuralError> {
        let value = self.values.get(row).ok_or_else(|| {
            StructuralError::CorruptState(format!("column row {row} out of bounds"))
        })?;
        out.write_value(value)
    }

    fn decode_row(&mut self, row: usize, input: &mut BinaryState) -> Result<(), StructuralError> {
        let value: T = input.read_value()?;
        let slot = self.values.get_mut(row).ok_or_else(|| {
            StructuralError::CorruptState(format!("column row {row} out of bounds"))
        })?;
        *slot = value;
        Ok(())
    }

    fn to_json(&self, row: usize) -> serde_json::Value {
        match self.values.get(row).map(serde_json::to_value) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                tracing::warn!(
                    component = std::any::type_name::<T>(),
                    row,
                    error = %e,
                    "component value cannot be rendered as JSON"
                );
                serde_json::Value::Null
            }
            None => serde_json::Value::Null,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentVtable
// ---------------------------------------------------------------------------

/// Function pointers for type-erased construction of a component's column.
#[derive(Clone, Copy)]
pub struct ComponentVtable {
    pub(crate) new_column: fn() -> Box<dyn ColumnStorage>,
}

impl ComponentVtable {
    /// Create a vtable for a concrete component type `T`.
    pub fn new<T: Component>() -> Self {
        fn new_column_impl<T: Component>() -> Box<dyn ColumnStorage> {
            Box::new(TypedColumn::<T>::new())
        }

        Self {
            new_column: new_column_impl::<T>,
        }
    }
}

impl fmt::Debug for ComponentVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentVtable").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// A registered component: its id, its schema name and how to build a column
/// for it.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: String,
    pub type_id: TypeId,
    pub(crate) vtable: ComponentVtable,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Every component type known to a [`Schema`](crate::schema::Schema).
///
/// Names and Rust types pair one-to-one across the whole schema: the same
/// `T` under the same name may be registered again (it resolves to the
/// existing id), anything else conflicts.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentTypeId>,
    names: HashMap<String, ComponentTypeId>,
    entries: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`StructuralError::ComponentNameConflict`] if `T` is known under
    /// another name or `name` belongs to another type.
    pub fn register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, StructuralError> {
        let type_id = TypeId::of::<T>();
        match (self.ids.get(&type_id), self.names.get(name)) {
            (Some(&known), Some(&named)) if known == named => return Ok(known),
            (None, None) => {}
            _ => {
                return Err(StructuralError::ComponentNameConflict {
                    name: name.to_owned(),
                })
            }
        }

        let id = ComponentTypeId(self.entries.len() as u32);
        self.entries.push(ComponentInfo {
            id,
            name: name.to_owned(),
            type_id,
            vtable: ComponentVtable::new::<T>(),
        });
        self.ids.insert(type_id, id);
        self.names.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.entries.get(id.0 as usize)
    }

    /// Registered name of a component, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id)
            .map(|info| info.name.as_str())
            .unwrap_or("<unregistered>")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Title(String);

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Size(u64);

    #[test]
    fn registered_component_is_found_by_type() {
        let mut registry = ComponentRegistry::new();
        let id = registry.register::<Title>("title").unwrap();
        assert_eq!(registry.lookup::<Title>(), Some(id));
        assert_eq!(registry.lookup::<Size>(), None);
        assert_eq!(registry.name_of(id), "title");
    }

    #[test]
    fn same_type_same_name_is_idempotent() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<Title>("title").unwrap();
        let b = registry.register::<Title>("title").unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_registration_fails() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Title>("title").unwrap();
        assert!(registry.register::<Title>("caption").is_err());
        assert!(registry.register::<Size>("title").is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn vtable_builds_matching_column() {
        let mut registry = ComponentRegistry::new();
        let id = registry.register::<Size>("size").unwrap();
        let info = registry.get_info(id).unwrap();
        let mut column = (info.vtable.new_column)();
        column.push_default();
        column.push_default();
        assert_eq!(column.len(), 2);

        let typed = column
            .as_any_mut()
            .downcast_mut::<TypedColumn<Size>>()
            .unwrap();
        *typed.get_mut(1).unwrap() = Size(9);
        column.swap_remove(0);
        let typed = column.as_any().downcast_ref::<TypedColumn<Size>>().unwrap();
        assert_eq!(typed.as_slice(), &[Size(9)]);
    }

    #[test]
    fn column_row_survives_state_roundtrip() {
        let mut source = TypedColumn::<Title>::new();
        source.push_default();
        *source.get_mut(0).unwrap() = Title("draft".to_owned());

        let mut state = BinaryState::new();
        source.encode_row(0, &mut state).unwrap();

        let mut target = TypedColumn::<Title>::new();
        target.push_default();
        target.decode_row(0, &mut state).unwrap();
        assert_eq!(target.get(0), Some(&Title("draft".to_owned())));
        assert_eq!(target.to_json(0), serde_json::json!("draft"));
    }
}
