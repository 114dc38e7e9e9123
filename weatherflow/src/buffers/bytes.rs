//! Raw response bytes shared between the fetch and deserialize stages.

use parking_lot::RwLock;
use std::sync::Arc;

/// Append-only byte buffer.
///
/// A buffer that already holds bytes when the fetch stage starts is treated
/// as a cached response.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Arc<RwLock<Vec<u8>>>,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer pre-seeded with `bytes`.
    #[must_use]
    pub fn seeded(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::new(RwLock::new(bytes.into())),
        }
    }

    /// Appends bytes.
    pub fn append(&self, bytes: &[u8]) {
        self.data.write().extend_from_slice(bytes);
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true when no bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copies the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}
