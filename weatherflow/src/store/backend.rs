//! Storage backends behind the session layer.

use super::{EntityRef, Region};
use crate::errors::Result;
use dashmap::DashMap;
use std::fmt::Debug;

/// Durable storage for committed regions.
pub trait StoreBackend: Send + Sync + Debug {
    /// Loads one committed region.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the backend cannot be read.
    fn load(&self, id: EntityRef) -> Result<Option<Region>>;

    /// Returns every committed region.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the backend cannot be read.
    fn scan(&self) -> Result<Vec<(EntityRef, Region)>>;

    /// Writes a batch of changes.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the batch cannot be written;
    /// in that case none of it is visible.
    fn commit(&self, changes: Vec<(EntityRef, Region)>) -> Result<()>;
}

/// In-process backend over a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    regions: DashMap<EntityRef, Region>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true when nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self, id: EntityRef) -> Result<Option<Region>> {
        Ok(self.regions.get(&id).map(|entry| entry.value().clone()))
    }

    fn scan(&self) -> Result<Vec<(EntityRef, Region)>> {
        Ok(self
            .regions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn commit(&self, changes: Vec<(EntityRef, Region)>) -> Result<()> {
        for (id, region) in changes {
            self.regions.insert(id, region);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_commit_and_load() {
        let backend = MemoryBackend::new();
        let id = EntityRef::new();
        let region = Region {
            sid: 42,
            ..Region::default()
        };

        backend.commit(vec![(id, region.clone())]).unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(backend.load(id).unwrap(), Some(region));
        assert_eq!(backend.load(EntityRef::new()).unwrap(), None);
        assert_eq!(backend.scan().unwrap().len(), 1);
    }
}
