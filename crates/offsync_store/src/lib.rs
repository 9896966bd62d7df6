//! # offsync Store
//!
//! Persistent local record store for offsync.
//!
//! This crate owns durability for the offline replica. It provides:
//! - A snapshot-oriented [`StorageBackend`] trait with in-memory and
//!   file implementations
//! - [`LocalStore`], two durable namespaces (records + metadata) with
//!   an atomic-intent bulk replace
//! - Destructive schema migration of the records namespace when an
//!   incompatible snapshot version is found (metadata is preserved)
//!
//! ## Design Principles
//!
//! - Backends are opaque byte stores; the store owns the snapshot format
//! - A record's identity is its primary key; a later write fully
//!   replaces the earlier one
//! - Metadata keys live in their own namespace and never collide with
//!   record keys
//!
//! ## Example
//!
//! ```rust
//! use offsync_store::{InMemoryBackend, LocalStore, Record};
//!
//! let store = LocalStore::open(InMemoryBackend::new()).unwrap();
//! store.put(Record::with_key("OP01-001")).unwrap();
//! assert_eq!(store.record_count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod record;
mod store;

pub use backend::StorageBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::Record;
pub use store::{LocalStore, ReplaceOutcome, REVISION_MARKER_KEY, SCHEMA_VERSION};
