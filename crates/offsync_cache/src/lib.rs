//! # offsync Cache
//!
//! Cache partitions, freshness strategies, and request dispatch for offsync.
//!
//! This crate provides:
//! - A minimal request/response model keyed by method + URL
//! - The [`Fetcher`] trait abstracting the network, with a scripted
//!   [`MockFetcher`] for tests
//! - [`CachePartition`]: a named durable request→response map persisted
//!   through an `offsync_store` backend
//! - The three cache strategies: cache-first, network-first, and
//!   stale-while-revalidate
//! - [`Dispatcher`]: classifies intercepted GET requests into exactly one
//!   partition/strategy pair, or passes them through
//!
//! ## Key Invariants
//!
//! - Only GET requests are intercepted; everything else passes through
//! - Routing rule sets are disjoint by construction ([`RouteConfig::validate`])
//! - Synthetic (offline placeholder) responses are never cached
//! - The stale-while-revalidate background refresh never blocks the caller

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dispatch;
mod error;
mod fetch;
#[cfg(feature = "http")]
mod http;
mod partition;
mod request;
mod response;
mod strategy;

pub use dispatch::{DispatchOutcome, Dispatcher, RouteConfig};
pub use error::{CacheError, CacheResult};
pub use fetch::{FetchResult, Fetcher, MockFetcher, TransportError};
#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use partition::{CacheKey, CachePartition, PartitionName};
pub use request::{Method, Request};
pub use response::Response;
pub use strategy::{cache_first, network_first, stale_while_revalidate, StrategyKind};
