//! Object store collaborator.
//!
//! Regions live in a [`StoreBackend`]. Work happens in [`Session`]s chained
//! to a long-lived main session; background sessions are children of it, so
//! a recursive save makes their changes visible on the main session and
//! durable in the backend. Entities cross session boundaries only as
//! [`EntityRef`]s.

mod backend;
mod model;
mod session;

pub use backend::{MemoryBackend, StoreBackend};
pub use model::{Coordinate, EntityRef, Forecast, Region};
pub use session::Session;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Entry point to the persisted regions.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    backend: Arc<dyn StoreBackend>,
    main: Session,
    spawned: Arc<AtomicUsize>,
}

impl ObjectStore {
    /// Creates a store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        let main = Session::new("main", None, Arc::clone(&backend));
        Self {
            backend,
            main,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a store over a fresh [`MemoryBackend`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// The caller-facing session.
    #[must_use]
    pub fn main_session(&self) -> Session {
        self.main.clone()
    }

    /// Opens a session under `parent`, or a root session writing straight to
    /// the backend.
    #[must_use]
    pub fn begin_scoped_session(&self, parent: Option<&Session>) -> Session {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        Session::new(format!("scoped-{n}"), parent.cloned(), Arc::clone(&self.backend))
    }

    /// Opens a child of the main session for background work.
    #[must_use]
    pub fn background_session(&self) -> Session {
        self.begin_scoped_session(Some(&self.main))
    }
}
