//! Command implementations.

pub mod inspect;
pub mod prefetch;
pub mod sync;

use offsync_cache::{CachePartition, PartitionName};
use offsync_store::{FileBackend, LocalStore, StoreResult};
use std::path::Path;

/// Snapshot file name used inside every backend directory.
const SNAPSHOT_FILE: &str = "snapshot.cbor";

/// Opens the record store under `<path>/replica/`.
pub fn open_store(path: &Path) -> StoreResult<LocalStore<FileBackend>> {
    let backend = FileBackend::open(&path.join("replica"), SNAPSHOT_FILE)?;
    LocalStore::open(backend)
}

/// Opens one cache partition under `<path>/partitions/<name>/`.
///
/// Each partition gets its own directory so every backend holds its own
/// advisory lock.
pub fn open_partition(
    path: &Path,
    name: PartitionName,
) -> Result<CachePartition<FileBackend>, Box<dyn std::error::Error>> {
    let dir = path.join("partitions").join(name.as_str());
    let backend = FileBackend::open(&dir, SNAPSHOT_FILE)?;
    Ok(CachePartition::open(name, backend)?)
}
