//! Request classification and dispatch.

use crate::error::{CacheError, CacheResult};
use crate::fetch::Fetcher;
use crate::partition::{CachePartition, PartitionName};
use crate::request::{Method, Request};
use crate::response::Response;
use crate::strategy::{cache_first, network_first, stale_while_revalidate, StrategyKind};
use offsync_store::StorageBackend;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Routing rules mapping URLs to partitions.
///
/// The three rule sets must be mutually exclusive; [`RouteConfig::validate`]
/// rejects any overlap so exactly one partition/strategy pair can match a
/// request.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Fixed manifest of shell asset URLs (exact match).
    pub shell_manifest: BTreeSet<String>,
    /// The dataset endpoint (exact match).
    pub data_endpoint: String,
    /// Asset directory prefix (prefix match).
    pub asset_prefix: String,
}

impl RouteConfig {
    /// Creates a config with an empty shell manifest.
    pub fn new(data_endpoint: impl Into<String>, asset_prefix: impl Into<String>) -> Self {
        Self {
            shell_manifest: BTreeSet::new(),
            data_endpoint: data_endpoint.into(),
            asset_prefix: asset_prefix.into(),
        }
    }

    /// Adds URLs to the shell asset manifest.
    #[must_use]
    pub fn with_shell_assets<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell_manifest.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Checks that the three rule sets are disjoint.
    pub fn validate(&self) -> CacheResult<()> {
        if self.data_endpoint.is_empty() {
            return Err(CacheError::Config("data endpoint must not be empty".into()));
        }
        if self.asset_prefix.is_empty() {
            return Err(CacheError::Config("asset prefix must not be empty".into()));
        }
        if self.data_endpoint.starts_with(&self.asset_prefix) {
            return Err(CacheError::Config(format!(
                "data endpoint {} is under asset prefix {}",
                self.data_endpoint, self.asset_prefix
            )));
        }
        if self.shell_manifest.contains(&self.data_endpoint) {
            return Err(CacheError::Config(format!(
                "data endpoint {} is listed in the shell manifest",
                self.data_endpoint
            )));
        }
        for url in &self.shell_manifest {
            if url.starts_with(&self.asset_prefix) {
                return Err(CacheError::Config(format!(
                    "shell asset {} is under asset prefix {}",
                    url, self.asset_prefix
                )));
            }
        }
        Ok(())
    }
}

/// Result of dispatching an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The engine produced a response.
    Handled(Response),
    /// Not ours: forward to the normal network path untouched.
    Passthrough,
}

/// Routes intercepted read requests to a partition + strategy.
///
/// Sits at the network boundary. Only GET requests are intercepted:
/// non-safe methods pass through by definition, and HEAD passes through
/// too so revision probes always reach the origin (and can never be
/// answered from or written into a cache).
pub struct Dispatcher<B: StorageBackend, F: Fetcher> {
    config: RouteConfig,
    shell: Arc<CachePartition<B>>,
    data: Arc<CachePartition<B>>,
    assets: Arc<CachePartition<B>>,
    fetcher: Arc<F>,
}

impl<B, F> Dispatcher<B, F>
where
    B: StorageBackend + 'static,
    F: Fetcher,
{
    /// Creates a dispatcher over the three partitions.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the routing rule sets overlap.
    pub fn new(
        config: RouteConfig,
        shell: Arc<CachePartition<B>>,
        data: Arc<CachePartition<B>>,
        assets: Arc<CachePartition<B>>,
        fetcher: Arc<F>,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shell,
            data,
            assets,
            fetcher,
        })
    }

    /// Classifies a request into its partition/strategy pair.
    ///
    /// Returns `None` for requests the engine does not handle.
    #[must_use]
    pub fn classify(&self, request: &Request) -> Option<(PartitionName, StrategyKind)> {
        if request.method != Method::Get {
            return None;
        }
        if self.config.shell_manifest.contains(&request.url) {
            return Some((PartitionName::Shell, StrategyKind::StaleWhileRevalidate));
        }
        if request.url == self.config.data_endpoint {
            return Some((PartitionName::Data, StrategyKind::NetworkFirst));
        }
        if request.url.starts_with(&self.config.asset_prefix) {
            return Some((PartitionName::Assets, StrategyKind::CacheFirst));
        }
        None
    }

    /// Handles an intercepted request end to end.
    pub async fn dispatch(&self, request: &Request) -> DispatchOutcome {
        match self.classify(request) {
            None => DispatchOutcome::Passthrough,
            Some((PartitionName::Shell, _)) => DispatchOutcome::Handled(
                stale_while_revalidate(&self.shell, &self.fetcher, request).await,
            ),
            Some((PartitionName::Data, _)) => DispatchOutcome::Handled(
                network_first(&self.data, &*self.fetcher, request).await,
            ),
            Some((PartitionName::Assets, _)) => DispatchOutcome::Handled(
                cache_first(&self.assets, &*self.fetcher, request).await,
            ),
        }
    }

    /// Returns a partition by name.
    #[must_use]
    pub fn partition(&self, name: PartitionName) -> &Arc<CachePartition<B>> {
        match name {
            PartitionName::Shell => &self.shell,
            PartitionName::Data => &self.data,
            PartitionName::Assets => &self.assets,
        }
    }
}
