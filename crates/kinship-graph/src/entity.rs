//! Generational entity handles and the slot table that locates them.
//!
//! An [`EntityId`] packs a *generation* counter in the high 32 bits and a
//! *slot* index in the low 32 bits. The slot table records which pack and which
//! row currently hold the entity, so a handle stays valid while swap-erase
//! shuffles rows underneath it. Destroying the entity bumps the generation and
//! every outstanding handle to it goes stale.
//!
//! Handles are process-local. Anything that must survive a destroy/recreate
//! cycle (undo, redo) holds a [`Reference`](crate::identity::Reference) instead.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::schema::TypeTag;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | slot: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from a slot index and generation.
    #[inline]
    pub fn new(slot: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | slot as u64)
    }

    /// The slot portion (low 32 bits).
    #[inline]
    pub fn slot(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Packed form, used as the handle suffix of generated names.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.slot(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Where a live entity is stored: its pack and its row within that pack.
///
/// A row is only meaningful until the next structural mutation of the pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub tag: TypeTag,
    pub row: usize,
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    /// `None` while the slot is free.
    location: Option<Location>,
}

/// Allocates and recycles [`EntityId`]s and tracks each live entity's
/// [`Location`].
///
/// Free slots are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot slot.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free_slots: VecDeque<u32>,
    live: usize,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle the next [`allocate`](Self::allocate) call will return.
    pub fn peek_next(&self) -> EntityId {
        match self.free_slots.front() {
            Some(&slot) => EntityId::new(slot, self.slots[slot as usize].generation),
            None => EntityId::new(self.slots.len() as u32, 0),
        }
    }

    /// Allocate a handle for an entity stored at `location`.
    pub fn allocate(&mut self, location: Location) -> EntityId {
        self.live += 1;
        if let Some(slot) = self.free_slots.pop_front() {
            // Generation was already bumped on release.
            let entry = &mut self.slots[slot as usize];
            entry.location = Some(location);
            EntityId::new(slot, entry.generation)
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                location: Some(location),
            });
            EntityId::new(slot, 0)
        }
    }

    /// Release a handle, bumping the slot generation so that outstanding
    /// copies become stale. Returns the entity's last location, or `None` if
    /// the handle was already stale.
    pub fn deallocate(&mut self, id: EntityId) -> Option<Location> {
        let entry = self.live_slot_mut(id)?;
        let location = entry.location.take();
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push_back(id.slot());
        self.live -= 1;
        location
    }

    /// The current location of a live entity.
    pub fn location(&self, id: EntityId) -> Option<Location> {
        let entry = self.slots.get(id.slot() as usize)?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.location
    }

    /// Point a live entity at a new row after a swap-erase moved it.
    pub fn relocate(&mut self, id: EntityId, row: usize) {
        if let Some(location) = self.live_slot_mut(id).and_then(|e| e.location.as_mut()) {
            location.row = row;
        }
    }

    /// Returns `true` if `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.location(id).is_some()
    }

    /// Number of live entities across all packs.
    pub fn alive_count(&self) -> usize {
        self.live
    }

    fn live_slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        let entry = self.slots.get_mut(id.slot() as usize)?;
        if entry.generation != id.generation() || entry.location.is_none() {
            return None;
        }
        Some(entry)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
