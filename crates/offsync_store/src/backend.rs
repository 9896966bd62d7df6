//! Storage backend trait definition.

use crate::error::StoreResult;

/// A snapshot-oriented storage backend.
///
/// Backends are **opaque byte stores**: they persist and reload a single
/// snapshot blob and do not interpret its contents. The store owns the
/// snapshot format (versioned CBOR).
///
/// # Invariants
///
/// - `persist` is all-or-nothing: after a failed `persist`, a subsequent
///   `load` must return the previously persisted snapshot, not a torn one
/// - `load` returns `None` only when nothing has ever been persisted
///
/// # Thread Safety
///
/// Backends must be `Send + Sync`; the store serializes writes itself.
pub trait StorageBackend: Send + Sync {
    /// Loads the current snapshot, or `None` if none exists yet.
    fn load(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically replaces the snapshot with `bytes`.
    fn persist(&self, bytes: &[u8]) -> StoreResult<()>;
}
