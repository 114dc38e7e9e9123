//! Ordered list shared by reference between stages.

use parking_lot::RwLock;
use std::sync::Arc;

/// An ordered, multiply-owned list of values.
#[derive(Debug)]
pub struct SharedList<T> {
    items: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for SharedList<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T: Clone> SharedList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list seeded with `items`.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    /// Appends one value.
    pub fn push(&self, item: T) {
        self.items.write().push(item);
    }

    /// Appends every value in order, under a single lock.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.items.write().extend(items);
    }

    /// Returns the first value.
    #[must_use]
    pub fn first(&self) -> Option<T> {
        self.items.read().first().cloned()
    }

    /// Returns the last value.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.items.read().last().cloned()
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true when the list holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copies the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }
}
