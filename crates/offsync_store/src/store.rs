//! The local store: records + metadata namespaces with snapshot durability.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Current snapshot schema version.
///
/// Version 2 changed the record primary key field; older snapshots get
/// their records namespace recreated on open (metadata is preserved).
pub const SCHEMA_VERSION: u32 = 2;

/// Well-known metadata key holding the last-synced revision marker.
pub const REVISION_MARKER_KEY: &str = "dataset.last_modified";

/// Outcome of a bulk replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Number of records written.
    pub written: usize,
    /// Number of records skipped (empty primary key).
    pub skipped: usize,
}

/// The two durable namespaces, serialized together as one snapshot.
#[derive(Debug, Clone, Default)]
struct Namespaces {
    records: BTreeMap<String, Record>,
    metadata: BTreeMap<String, String>,
}

/// On-disk snapshot layout.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    schema_version: u32,
    records: &'a BTreeMap<String, Record>,
    metadata: &'a BTreeMap<String, String>,
}

/// Lenient snapshot decoder: records are kept opaque so a snapshot from
/// an incompatible schema version can still surrender its metadata.
#[derive(Deserialize)]
struct RawSnapshot {
    schema_version: u32,
    records: ciborium::value::Value,
    metadata: BTreeMap<String, String>,
}

/// Keyed record storage plus a singleton metadata namespace.
///
/// The store keeps both namespaces in memory and persists them together
/// as a versioned CBOR snapshot through its [`StorageBackend`]. All
/// mutating operations persist before returning; if persisting fails the
/// in-memory state is rolled back, so callers never observe a state that
/// is not on durable storage.
///
/// # Concurrency
///
/// Safe for concurrent use across tasks. Mutations hold the internal
/// write lock across the persist call, so bulk replaces are serialized
/// against each other and against individual writes.
pub struct LocalStore<B: StorageBackend> {
    backend: B,
    inner: RwLock<Namespaces>,
}

impl<B: StorageBackend> LocalStore<B> {
    /// Opens the store, loading and validating any persisted snapshot.
    ///
    /// A snapshot with an older `schema_version` triggers destructive
    /// migration: the records namespace is recreated empty while the
    /// metadata namespace is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a snapshot exists but
    /// cannot be decoded at all, or if it was written by a newer schema
    /// version. This is fatal: the store never silently discards data it
    /// cannot interpret.
    pub fn open(backend: B) -> StoreResult<Self> {
        let namespaces = match backend.load()? {
            None => Namespaces::default(),
            Some(bytes) => {
                let raw: RawSnapshot = ciborium::de::from_reader(bytes.as_slice())
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;

                if raw.schema_version == SCHEMA_VERSION {
                    let records: BTreeMap<String, Record> = raw
                        .records
                        .deserialized()
                        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                    Namespaces {
                        records,
                        metadata: raw.metadata,
                    }
                } else if raw.schema_version < SCHEMA_VERSION {
                    warn!(
                        found = raw.schema_version,
                        expected = SCHEMA_VERSION,
                        "outdated snapshot schema, recreating records namespace"
                    );
                    Namespaces {
                        records: BTreeMap::new(),
                        metadata: raw.metadata,
                    }
                } else {
                    // Never destroy data written by a later release.
                    return Err(StoreError::Unavailable(format!(
                        "snapshot schema v{} is newer than supported v{}",
                        raw.schema_version, SCHEMA_VERSION
                    )));
                }
            }
        };

        let store = Self {
            backend,
            inner: RwLock::new(namespaces),
        };

        // Re-persist so the on-disk snapshot carries the current version.
        store.persist(&store.inner.read())?;
        Ok(store)
    }

    /// Returns the record with the given primary key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Record> {
        self.inner.read().records.get(key).cloned()
    }

    /// Returns all records.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.inner.read().records.values().cloned().collect()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns true if the records namespace is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Writes a single record, fully replacing any record with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyKey`] if the primary key is empty.
    pub fn put(&self, record: Record) -> StoreResult<()> {
        if record.key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let mut inner = self.inner.write();
        let previous = inner.records.insert(record.key.clone(), record.clone());
        if let Err(e) = self.persist(&inner) {
            match previous {
                Some(prev) => inner.records.insert(record.key, prev),
                None => inner.records.remove(&record.key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<String> {
        self.inner.read().metadata.get(key).cloned()
    }

    /// Sets a metadata value.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
        let key = key.into();
        let mut inner = self.inner.write();
        let previous = inner.metadata.insert(key.clone(), value.into());
        if let Err(e) = self.persist(&inner) {
            match previous {
                Some(prev) => inner.metadata.insert(key, prev),
                None => inner.metadata.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Atomically replaces all records and the revision marker.
    ///
    /// Clears the records namespace, writes every incoming record, then
    /// writes `marker` under [`REVISION_MARKER_KEY`], and persists the
    /// whole snapshot once. If persisting fails, the previous state is
    /// restored and no marker update takes effect.
    ///
    /// Records with an empty primary key do not abort the batch: they
    /// are skipped, counted in [`ReplaceOutcome::skipped`], and logged.
    /// The marker is committed even when skips occurred; callers that
    /// need a fully represented revision must check the outcome.
    pub fn replace_all(&self, records: &[Record], marker: &str) -> StoreResult<ReplaceOutcome> {
        let mut inner = self.inner.write();
        let backup = inner.clone();

        inner.records.clear();
        let mut written = 0usize;
        let mut skipped = 0usize;
        for record in records {
            if record.key.is_empty() {
                warn!("skipping record with empty primary key during replace");
                skipped += 1;
                continue;
            }
            inner.records.insert(record.key.clone(), record.clone());
            written += 1;
        }

        inner
            .metadata
            .insert(REVISION_MARKER_KEY.to_string(), marker.to_string());

        if let Err(e) = self.persist(&inner) {
            *inner = backup;
            return Err(e);
        }

        if skipped > 0 {
            warn!(written, skipped, "bulk replace completed with skipped records");
        } else {
            debug!(written, marker, "bulk replace committed");
        }

        Ok(ReplaceOutcome { written, skipped })
    }

    /// Removes all records and metadata.
    pub fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let backup = inner.clone();
        inner.records.clear();
        inner.metadata.clear();
        if let Err(e) = self.persist(&inner) {
            *inner = backup;
            return Err(e);
        }
        Ok(())
    }

    /// Returns a reference to the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn persist(&self, namespaces: &Namespaces) -> StoreResult<()> {
        let snapshot = SnapshotRef {
            schema_version: SCHEMA_VERSION,
            records: &namespaces.records,
            metadata: &namespaces.metadata,
        };
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&snapshot, &mut buf).map_err(StoreError::codec)?;
        self.backend.persist(&buf)
    }
}
