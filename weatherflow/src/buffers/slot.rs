//! Write-once typed edge between a producer and its consumers.

use parking_lot::RwLock;
use std::sync::Arc;

/// A value written at most once and read by any number of consumers.
///
/// Consumers read after their producer has settled, so reads never block.
#[derive(Debug)]
pub struct Slot<T> {
    value: Arc<RwLock<Option<T>>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(RwLock::new(None)),
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot that is already resolved.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(Some(value))),
        }
    }

    /// Resolves the slot.
    ///
    /// # Errors
    ///
    /// Returns the rejected value if the slot was already resolved.
    pub fn set(&self, value: T) -> Result<(), T> {
        let mut guard = self.value.write();
        if guard.is_some() {
            return Err(value);
        }
        *guard = Some(value);
        Ok(())
    }

    /// Returns a copy of the value, if resolved.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.value.read().clone()
    }

    /// Returns true once the slot has been resolved.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.read().is_some()
    }
}
