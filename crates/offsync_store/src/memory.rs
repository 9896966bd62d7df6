//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory storage backend.
///
/// This backend keeps the snapshot in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral replicas that don't need persistence
///
/// For testing rollback paths, the next `persist` call can be made to
/// fail with [`InMemoryBackend::fail_next_persist`]. A failed persist
/// leaves the previously stored snapshot intact, matching the contract
/// of [`StorageBackend`].
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    snapshot: RwLock<Option<Vec<u8>>>,
    fail_next: AtomicBool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-loaded with a snapshot.
    ///
    /// Useful for testing open/migration scenarios.
    #[must_use]
    pub fn with_snapshot(bytes: Vec<u8>) -> Self {
        Self {
            snapshot: RwLock::new(Some(bytes)),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Makes the next `persist` call fail with an I/O error.
    pub fn fail_next_persist(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Returns a copy of the current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.snapshot.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.snapshot.read().clone())
    }

    fn persist(&self, bytes: &[u8]) -> StoreResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected persist failure",
            )));
        }
        *self.snapshot.write() = Some(bytes.to_vec());
        Ok(())
    }
}
