//! Scoped sessions with parent chaining.
//!
//! A session buffers its changes until `save`. Saving a child pushes its
//! changes into the parent; saving the root session commits to the backend.
//! Reads see the session's own changes first, then each ancestor's, then the
//! backend.

use super::{EntityRef, Region, StoreBackend};
use crate::errors::{Result, WeatherflowError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of work against the object store.
///
/// Handles are cheap to clone but a session is meant to be used by one task
/// at a time.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    name: String,
    parent: Option<Session>,
    backend: Arc<dyn StoreBackend>,
    pending: Mutex<HashMap<EntityRef, Region>>,
}

impl Session {
    pub(crate) fn new(
        name: impl Into<String>,
        parent: Option<Session>,
        backend: Arc<dyn StoreBackend>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.into(),
                parent,
                backend,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Name of the session.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Parent session, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Session> {
        self.inner.parent.as_ref()
    }

    /// Returns true if the session holds unsaved changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.inner.pending.lock().is_empty()
    }

    /// Returns every visible region matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the backend cannot be read.
    pub fn fetch<P>(&self, predicate: P) -> Result<Vec<(EntityRef, Region)>>
    where
        P: Fn(&Region) -> bool,
    {
        let mut view: HashMap<EntityRef, Region> = self.inner.backend.scan()?.into_iter().collect();
        for session in self.lineage().into_iter().rev() {
            for (id, region) in session.inner.pending.lock().iter() {
                view.insert(*id, region.clone());
            }
        }

        let mut matches: Vec<(EntityRef, Region)> =
            view.into_iter().filter(|(_, region)| predicate(region)).collect();
        matches.sort_by_key(|(id, _)| *id);
        Ok(matches)
    }

    /// Returns the first visible region matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the backend cannot be read.
    pub fn fetch_first<P>(&self, predicate: P) -> Result<Option<(EntityRef, Region)>>
    where
        P: Fn(&Region) -> bool,
    {
        Ok(self.fetch(predicate)?.into_iter().next())
    }

    /// Stages a new region and returns its reference.
    pub fn insert(&self, region: Region) -> EntityRef {
        let id = EntityRef::new();
        self.inner.pending.lock().insert(id, region);
        id
    }

    /// Stages a new version of an existing region.
    pub fn update(&self, id: EntityRef, region: Region) {
        self.inner.pending.lock().insert(id, region);
    }

    /// Re-resolves a reference in this session's view.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if the backend cannot be read.
    pub fn resolve(&self, id: EntityRef) -> Result<Option<Region>> {
        for session in self.lineage() {
            if let Some(region) = session.inner.pending.lock().get(&id) {
                return Ok(Some(region.clone()));
            }
        }
        self.inner.backend.load(id)
    }

    /// Saves staged changes into the parent, or into the backend for a root
    /// session. With `recursive`, the parent is saved too, up to the root.
    ///
    /// # Errors
    ///
    /// Returns `WeatherflowError::Persistence` if any level fails; changes at
    /// the failing level stay staged.
    pub fn save(&self, recursive: bool) -> Result<()> {
        let changes: Vec<(EntityRef, Region)> = self.inner.pending.lock().drain().collect();
        debug!(session = %self.inner.name, changes = changes.len(), recursive, "Saving session");

        match &self.inner.parent {
            Some(parent) => {
                parent.inner.pending.lock().extend(changes);
                if recursive {
                    parent.save(true)?;
                }
                Ok(())
            }
            None => {
                if changes.is_empty() {
                    return Ok(());
                }
                if let Err(err) = self.inner.backend.commit(changes.clone()) {
                    warn!(session = %self.inner.name, error = %err, "Commit failed");
                    let mut pending = self.inner.pending.lock();
                    for (id, region) in changes {
                        pending.entry(id).or_insert(region);
                    }
                    return Err(match err {
                        WeatherflowError::Persistence { .. } => err,
                        other => WeatherflowError::persistence(other.to_string()),
                    });
                }
                Ok(())
            }
        }
    }

    /// This session followed by its ancestors, nearest first.
    fn lineage(&self) -> Vec<Session> {
        let mut chain = vec![self.clone()];
        let mut current = self.inner.parent.clone();
        while let Some(session) = current {
            current = session.inner.parent.clone();
            chain.push(session);
        }
        chain
    }
}
