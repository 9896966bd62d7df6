//! Named durable cache partitions.

use crate::error::CacheResult;
use crate::request::{Method, Request};
use crate::response::Response;
use offsync_store::StorageBackend;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The three cache partitions. Partitions are independent: clearing or
/// re-versioning one never affects another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionName {
    /// Static application shell assets.
    Shell,
    /// The remote dataset payload.
    Data,
    /// Large binary resources (images).
    Assets,
}

impl PartitionName {
    /// Stable partition identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionName::Shell => "app-shell",
            PartitionName::Data => "dataset",
            PartitionName::Assets => "assets",
        }
    }
}

/// Cache identity: method + URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: String,
}

impl From<&Request> for CacheKey {
    fn from(request: &Request) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
        }
    }
}

/// A named, durable request→response map.
///
/// Entries are kept in memory and persisted as a CBOR snapshot through a
/// [`StorageBackend`] after every mutation. Unlike the record store, an
/// undecodable partition snapshot is not fatal: cached responses are
/// re-fetchable, so the partition restarts empty with a warning.
///
/// Only successful, non-synthetic GET responses are stored; anything
/// else is silently dropped so an error body can never poison the cache.
///
/// There is no eviction: unbounded growth is accepted, and a quota
/// policy would plug in on top of [`CachePartition::clear`].
pub struct CachePartition<B: StorageBackend> {
    name: PartitionName,
    backend: B,
    entries: RwLock<HashMap<CacheKey, Response>>,
}

impl<B: StorageBackend> CachePartition<B> {
    /// Opens a partition, reloading any persisted entries.
    pub fn open(name: PartitionName, backend: B) -> CacheResult<Self> {
        let entries = match backend.load()? {
            None => HashMap::new(),
            Some(bytes) => match ciborium::de::from_reader::<Vec<(CacheKey, Response)>, _>(
                bytes.as_slice(),
            ) {
                Ok(pairs) => pairs.into_iter().collect(),
                Err(e) => {
                    warn!(partition = name.as_str(), error = %e, "undecodable partition snapshot, starting empty");
                    HashMap::new()
                }
            },
        };

        Ok(Self {
            name,
            backend,
            entries: RwLock::new(entries),
        })
    }

    /// Returns this partition's name.
    #[must_use]
    pub fn name(&self) -> PartitionName {
        self.name
    }

    /// Returns the cached response for a request, if any.
    #[must_use]
    pub fn lookup(&self, request: &Request) -> Option<Response> {
        self.entries.read().get(&CacheKey::from(request)).cloned()
    }

    /// Returns true if a response is cached for this request.
    #[must_use]
    pub fn contains(&self, request: &Request) -> bool {
        self.entries.read().contains_key(&CacheKey::from(request))
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the partition has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stores a copy of `response` for `request`.
    ///
    /// Non-GET requests, non-2xx responses, and synthetic responses are
    /// dropped without error; the caller's response is unaffected either
    /// way.
    pub fn store(&self, request: &Request, response: &Response) -> CacheResult<()> {
        if request.method != Method::Get || !response.is_ok() || response.synthetic {
            debug!(
                partition = self.name.as_str(),
                url = %request.url,
                status = response.status,
                "not caching response"
            );
            return Ok(());
        }

        let mut entries = self.entries.write();
        entries.insert(CacheKey::from(request), response.clone());
        self.persist(&entries)
    }

    /// Removes all entries.
    pub fn clear(&self) -> CacheResult<()> {
        let mut entries = self.entries.write();
        entries.clear();
        self.persist(&entries)
    }

    fn persist(&self, entries: &HashMap<CacheKey, Response>) -> CacheResult<()> {
        let pairs: Vec<(&CacheKey, &Response)> = entries.iter().collect();
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&pairs, &mut buf)
            .map_err(offsync_store::StoreError::codec)?;
        self.backend.persist(&buf)?;
        Ok(())
    }
}
