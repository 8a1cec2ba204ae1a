//! Per-session object handle table.

use crate::error::SessionError;
use ropkit_protocol::{HandleIndex, ObjectHandle};
use std::collections::HashMap;

/// Maps handle-table slots to opaque server object handles.
///
/// Entries are created when operations open objects, destroyed by Release
/// or session teardown. Slot values are 0–255; the reserved
/// [`HandleIndex::AMBIENT`] index resolves to the ambient handle supplied
/// with the current call and never occupies a slot.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: HashMap<u8, ObjectHandle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `slot` to `handle`, replacing any previous binding.
    pub fn allocate(&mut self, slot: u8, handle: ObjectHandle) {
        self.slots.insert(slot, handle);
    }

    /// Resolves a concrete slot.
    pub fn resolve_slot(&self, slot: u8) -> Result<ObjectHandle, SessionError> {
        self.slots
            .get(&slot)
            .copied()
            .ok_or(SessionError::UnknownHandleIndex(slot as u16))
    }

    /// Resolves a handle index against the table, with the ambient sentinel
    /// resolving to `ambient`.
    pub fn resolve(
        &self,
        index: HandleIndex,
        ambient: ObjectHandle,
    ) -> Result<ObjectHandle, SessionError> {
        if index.is_ambient() {
            return Ok(ambient);
        }
        match index.as_slot() {
            Some(slot) => self.resolve_slot(slot),
            None => Err(SessionError::UnknownHandleIndex(index.0)),
        }
    }

    /// Removes a slot binding. Returns whether one existed.
    pub fn release(&mut self, slot: u8) -> bool {
        self.slots.remove(&slot).is_some()
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the table as a dense slot-indexed vector, with
    /// [`ObjectHandle::NONE`] filling unallocated slots below the highest
    /// allocated one. This is the shape response buffers carry.
    pub fn snapshot(&self) -> Vec<ObjectHandle> {
        let Some(max) = self.slots.keys().max() else {
            return Vec::new();
        };
        (0..=*max)
            .map(|slot| self.slots.get(&slot).copied().unwrap_or(ObjectHandle::NONE))
            .collect()
    }
}
