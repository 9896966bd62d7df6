//! Fetch transport abstraction.

use crate::request::{Method, Request};
use crate::response::Response;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// A transport-level failure: network unreachable, timeout, connection
/// reset. Distinct from a reachable origin answering with a non-2xx
/// status, which arrives as a normal [`Response`].
#[derive(Debug, Clone, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    /// Human-readable failure description.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a fetch attempt.
pub type FetchResult = Result<Response, TransportError>;

/// The network seam.
///
/// Strategies, the sync controller, and the prefetcher all reach the
/// network exclusively through this trait, allowing tests to script
/// outcomes with [`MockFetcher`].
pub trait Fetcher: Send + Sync + 'static {
    /// Performs the request against the origin.
    fn fetch(&self, request: &Request) -> impl Future<Output = FetchResult> + Send;
}

/// Scripted outcomes for one method + URL pair.
#[derive(Debug, Default)]
struct Script {
    outcomes: Vec<FetchResult>,
    next: usize,
}

/// A mock fetcher for testing.
///
/// Outcomes are scripted per method + URL and consumed in order; once a
/// script is exhausted its last outcome repeats. Requests with no script
/// fail with a transport error, and every attempt is counted.
#[derive(Debug, Default)]
pub struct MockFetcher {
    scripts: Mutex<HashMap<(Method, String), Script>>,
    counts: Mutex<HashMap<(Method, String), u64>>,
}

impl MockFetcher {
    /// Creates a new mock fetcher with no scripted outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a successful GET response for `url`.
    pub fn respond(&self, url: impl Into<String>, response: Response) {
        self.script(Method::Get, url, Ok(response));
    }

    /// Scripts a successful HEAD response for `url` (revision probes).
    pub fn respond_head(&self, url: impl Into<String>, response: Response) {
        self.script(Method::Head, url, Ok(response));
    }

    /// Scripts a GET transport failure for `url`.
    pub fn fail(&self, url: impl Into<String>) {
        self.script(Method::Get, url, Err(TransportError::new("scripted failure")));
    }

    /// Scripts a HEAD transport failure for `url`.
    pub fn fail_head(&self, url: impl Into<String>) {
        self.script(Method::Head, url, Err(TransportError::new("scripted failure")));
    }

    /// Returns how many times `url` has been fetched with GET.
    #[must_use]
    pub fn fetch_count(&self, url: &str) -> u64 {
        self.count_of(Method::Get, url)
    }

    /// Returns how many times `url` has been probed with HEAD.
    #[must_use]
    pub fn head_count(&self, url: &str) -> u64 {
        self.count_of(Method::Head, url)
    }

    fn script(&self, method: Method, url: impl Into<String>, outcome: FetchResult) {
        self.scripts
            .lock()
            .entry((method, url.into()))
            .or_default()
            .outcomes
            .push(outcome);
    }

    fn count_of(&self, method: Method, url: &str) -> u64 {
        self.counts
            .lock()
            .get(&(method, url.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn next_outcome(&self, method: Method, url: &str) -> FetchResult {
        *self
            .counts
            .lock()
            .entry((method, url.to_string()))
            .or_insert(0) += 1;

        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(&(method, url.to_string())) else {
            return Err(TransportError::new(format!("no scripted outcome for {url}")));
        };
        if script.outcomes.is_empty() {
            return Err(TransportError::new(format!("no scripted outcome for {url}")));
        }
        let index = script.next.min(script.outcomes.len() - 1);
        script.next += 1;
        script.outcomes[index].clone()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, request: &Request) -> impl Future<Output = FetchResult> + Send {
        let outcome = self.next_outcome(request.method, &request.url);
        async move { outcome }
    }
}
