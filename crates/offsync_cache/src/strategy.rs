//! The three cache strategies.
//!
//! Each strategy is a stateless async function over one partition and
//! the fetch seam. Strategy behavior (including which synthetic status a
//! failure yields) is part of the engine's contract with its callers.

use crate::fetch::Fetcher;
use crate::partition::CachePartition;
use crate::request::Request;
use crate::response::Response;
use offsync_store::StorageBackend;
use std::sync::Arc;
use tracing::warn;

/// Which strategy a partition is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Cached entry wins; network only on a miss.
    CacheFirst,
    /// Network wins; cache is the offline fallback.
    NetworkFirst,
    /// Cached entry returned immediately, refreshed in the background.
    StaleWhileRevalidate,
}

/// Cache-first: return the cached entry if present, otherwise fetch and
/// cache a successful response.
///
/// A transport failure or non-2xx response with no cached entry yields
/// the synthesized not-found response instead of propagating the error.
pub async fn cache_first<B, F>(
    partition: &CachePartition<B>,
    fetcher: &F,
    request: &Request,
) -> Response
where
    B: StorageBackend,
    F: Fetcher,
{
    if let Some(hit) = partition.lookup(request) {
        return hit;
    }

    match fetcher.fetch(request).await {
        Ok(response) if response.is_ok() => {
            if let Err(e) = partition.store(request, &response) {
                warn!(url = %request.url, error = %e, "failed to cache fetched asset");
            }
            response
        }
        Ok(response) => {
            warn!(url = %request.url, status = response.status, "cache-first fetch returned non-2xx");
            Response::not_found()
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "cache-first fetch failed with no cached entry");
            Response::not_found()
        }
    }
}

/// Network-first: fetch, cache and return on success; fall back to the
/// cached entry on transport failure.
///
/// A reachable origin answering non-2xx is returned as-is and never
/// cached, so an error body cannot poison the partition.
pub async fn network_first<B, F>(
    partition: &CachePartition<B>,
    fetcher: &F,
    request: &Request,
) -> Response
where
    B: StorageBackend,
    F: Fetcher,
{
    match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                if let Err(e) = partition.store(request, &response) {
                    warn!(url = %request.url, error = %e, "failed to cache network response");
                }
            }
            response
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "network-first fetch failed, trying cache");
            partition
                .lookup(request)
                .unwrap_or_else(Response::unavailable)
        }
    }
}

/// Stale-while-revalidate: return the cached entry immediately and
/// refresh it in the background.
///
/// The background refresh never blocks the caller and its outcome is not
/// observable by the original caller; only future requests see the
/// refreshed value. With an empty cache the caller waits on the network
/// directly (first-load case); if that also fails, the synthesized
/// unavailable response is returned.
pub async fn stale_while_revalidate<B, F>(
    partition: &Arc<CachePartition<B>>,
    fetcher: &Arc<F>,
    request: &Request,
) -> Response
where
    B: StorageBackend + 'static,
    F: Fetcher,
{
    if let Some(hit) = partition.lookup(request) {
        let partition = Arc::clone(partition);
        let fetcher = Arc::clone(fetcher);
        let request = request.clone();
        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    if let Err(e) = partition.store(&request, &response) {
                        warn!(url = %request.url, error = %e, "background revalidation store failed");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %request.url, error = %e, "background revalidation fetch failed");
                }
            }
        });
        return hit;
    }

    match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                if let Err(e) = partition.store(request, &response) {
                    warn!(url = %request.url, error = %e, "failed to cache first-load shell asset");
                }
            }
            response
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "shell asset unavailable from cache and network");
            Response::unavailable()
        }
    }
}
