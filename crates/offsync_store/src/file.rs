//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the advisory lock file next to the snapshot.
const LOCK_FILE: &str = "LOCK";

/// A file-based storage backend.
///
/// The snapshot lives in a single file inside the given directory. Writes
/// go to a temporary file which is fsynced and then renamed over the
/// current snapshot, so a crash mid-persist never leaves a torn snapshot.
///
/// An advisory exclusive lock (`LOCK` file) enforces single-writer access
/// across processes. The lock is released when the backend is dropped.
///
/// # Example
///
/// ```no_run
/// use offsync_store::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("replica"), "store.cbor").unwrap();
/// backend.persist(b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    snapshot_path: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Opens a file backend in `dir`, creating the directory if needed.
    ///
    /// `file_name` is the snapshot file name inside `dir`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another process holds the lock
    /// - [`StoreError::Io`] if the directory or lock file cannot be created
    pub fn open(dir: &Path, file_name: &str) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Non-blocking: a held lock means another replica owns this directory.
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: lock_path.display().to_string(),
            });
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            snapshot_path: dir.join(file_name),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(&self.snapshot_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, bytes: &[u8]) -> StoreResult<()> {
        let tmp_path = self.dir.join(".snapshot.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(bytes)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.snapshot_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_load_before_persist_is_none() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path(), "store.cbor").unwrap();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn file_persist_then_load() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::open(temp.path(), "store.cbor").unwrap();

        backend.persist(b"durable data").unwrap();
        assert_eq!(backend.load().unwrap().unwrap(), b"durable data");
    }

    #[test]
    fn file_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let backend = FileBackend::open(temp.path(), "store.cbor").unwrap();
            backend.persist(b"persisted").unwrap();
        }
        let backend = FileBackend::open(temp.path(), "store.cbor").unwrap();
        assert_eq!(backend.load().unwrap().unwrap(), b"persisted");
    }

    #[test]
    fn file_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        let backend = FileBackend::open(&nested, "store.cbor").unwrap();
        backend.persist(b"x").unwrap();
        assert!(nested.join("store.cbor").exists());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = TempDir::new().unwrap();
        let _first = FileBackend::open(temp.path(), "store.cbor").unwrap();

        let second = FileBackend::open(temp.path(), "store.cbor");
        assert!(matches!(second, Err(StoreError::Locked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _backend = FileBackend::open(temp.path(), "store.cbor").unwrap();
        }
        assert!(FileBackend::open(temp.path(), "store.cbor").is_ok());
    }
}
