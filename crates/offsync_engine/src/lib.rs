//! # offsync Engine
//!
//! Sync controller, deployment lifecycle, and asset prefetcher for offsync.
//!
//! This crate provides:
//! - Version-checked sync state machine (unknown → checking → up-to-date /
//!   update-available / updating / error)
//! - First-run bootstrap, update prompting, and inconsistency repair
//! - Deployment update lifecycle (idle → installing → waiting →
//!   activating → active) with a bounded activation timeout
//! - Bounded-concurrency asset prefetch with per-item progress
//! - The engine→UI event channel
//!
//! ## Key Invariants
//!
//! - At most one bulk replace is in flight at a time
//! - The sync state never reads `UpToDate` while an update is applying
//! - The revision marker is only written after a replace was attempted
//! - `DeploymentWaiting` is notified exactly once per pending version
//! - The lifecycle never sticks in `Activating`: confirmation or a
//!   forced reload always resolves it
//! - A prefetch job always runs to completion; per-item failures never
//!   abort it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod events;
mod lifecycle;
mod prefetch;
mod sync;

pub use error::{EngineError, EngineResult};
pub use events::{ChannelSink, EngineEvent, EventSink, MemorySink};
pub use lifecycle::{DeploymentHandle, DeploymentState, LifecycleCoordinator, MockDeployment};
pub use prefetch::{PrefetchReport, Prefetcher, DEFAULT_CONCURRENCY};
pub use sync::{SyncConfig, SyncController, SyncState};
