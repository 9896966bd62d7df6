//! Bounded-concurrency asset prefetcher.

use crate::error::EngineResult;
use crate::events::{EngineEvent, EventSink};
use offsync_cache::{CachePartition, Fetcher, Request};
use offsync_store::StorageBackend;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default number of concurrent prefetch workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Outcome of a completed prefetch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Distinct items in the job.
    pub total: usize,
    /// Items processed (always equals `total` when the job returns).
    pub completed: usize,
    /// Items that failed to fetch or cache.
    pub failed: usize,
}

impl PrefetchReport {
    /// True when every item was fetched and cached.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

struct Progress {
    total: usize,
    completed: usize,
    failed: usize,
}

/// Fetches a list of URLs into a cache partition with a bounded worker
/// pool.
///
/// The job always runs to completion: a failed item is counted and
/// skipped, never retried and never fatal. Items already present in the
/// partition are counted as done without touching the network, so
/// re-running a job after a partial failure only fetches what is
/// missing.
pub struct Prefetcher<B: StorageBackend, F: Fetcher, S: EventSink> {
    partition: Arc<CachePartition<B>>,
    fetcher: Arc<F>,
    sink: Arc<S>,
}

impl<B, F, S> Prefetcher<B, F, S>
where
    B: StorageBackend + 'static,
    F: Fetcher,
    S: EventSink,
{
    /// Creates a prefetcher over a partition and transport.
    pub fn new(partition: Arc<CachePartition<B>>, fetcher: Arc<F>, sink: Arc<S>) -> Self {
        Self {
            partition,
            fetcher,
            sink,
        }
    }

    /// Runs a prefetch job over `urls` with at most `concurrency`
    /// parallel fetches.
    ///
    /// Duplicate and empty URLs are dropped up front; progress events
    /// count distinct items only. Emits one
    /// [`EngineEvent::PrefetchProgress`] per processed item, with
    /// `completed` monotonically non-decreasing across the job.
    pub async fn run(&self, urls: &[String], concurrency: usize) -> EngineResult<PrefetchReport> {
        let mut seen = BTreeSet::new();
        let queue: VecDeque<String> = urls
            .iter()
            .filter(|u| !u.is_empty() && seen.insert(u.as_str()))
            .cloned()
            .collect();

        let total = queue.len();
        if total == 0 {
            debug!("prefetch job with no items");
            return Ok(PrefetchReport {
                total: 0,
                completed: 0,
                failed: 0,
            });
        }

        let workers = concurrency.clamp(1, total);
        info!(total, workers, "starting prefetch job");

        let queue = Arc::new(Mutex::new(queue));
        let progress = Arc::new(Mutex::new(Progress {
            total,
            completed: 0,
            failed: 0,
        }));

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let progress = Arc::clone(&progress);
            let partition = Arc::clone(&self.partition);
            let fetcher = Arc::clone(&self.fetcher);
            let sink = Arc::clone(&self.sink);

            set.spawn(async move {
                loop {
                    let Some(url) = queue.lock().pop_front() else {
                        return;
                    };
                    let request = Request::get(&url);

                    let failed = if partition.contains(&request) {
                        debug!(url = %url, "already cached, skipping fetch");
                        false
                    } else {
                        match fetcher.fetch(&request).await {
                            Ok(response) if response.is_ok() => {
                                match partition.store(&request, &response) {
                                    Ok(()) => false,
                                    Err(e) => {
                                        warn!(url = %url, error = %e, "failed to cache prefetched item");
                                        true
                                    }
                                }
                            }
                            Ok(response) => {
                                warn!(url = %url, status = response.status, "prefetch got error status");
                                true
                            }
                            Err(e) => {
                                warn!(url = %url, error = %e, "prefetch fetch failed");
                                true
                            }
                        }
                    };

                    // Count and emit under one lock so observers never
                    // see progress move backwards.
                    let mut p = progress.lock();
                    p.completed += 1;
                    if failed {
                        p.failed += 1;
                    }
                    sink.emit(EngineEvent::PrefetchProgress {
                        completed: p.completed,
                        total: p.total,
                        failed: p.failed,
                    });
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "prefetch worker aborted");
            }
        }

        let p = progress.lock();
        let report = PrefetchReport {
            total: p.total,
            completed: p.completed,
            failed: p.failed,
        };
        info!(
            total = report.total,
            failed = report.failed,
            "prefetch job finished"
        );
        Ok(report)
    }
}
