//! Single-slot, last-write-wins cell.
//!
//! Producers (the sensor callback, the pose tracker) overwrite the slot at
//! their own rate; the fusion loop reads whatever is there on each tick.
//! Intermediate values are dropped and nothing ever blocks for long: the lock
//! is held only to copy the value in or out.

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared handle to the latest value of type `T`.  Clones share the slot.
#[derive(Debug)]
pub struct LatestCell<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for LatestCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for LatestCell<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone> LatestCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored value.
    pub fn publish(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Copy of the stored value, left in place.
    pub fn latest(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    /// Move the stored value out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }
}
