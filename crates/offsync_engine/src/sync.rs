//! Version-checked sync controller.

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSink};
use offsync_cache::{Fetcher, Request};
use offsync_store::{LocalStore, Record, ReplaceOutcome, StorageBackend, REVISION_MARKER_KEY};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// The current state of the sync controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No check has run yet.
    Unknown,
    /// A revision probe is in flight.
    Checking,
    /// Local replica matches the remote revision.
    UpToDate,
    /// A newer revision exists; waiting for the caller to apply it.
    UpdateAvailable,
    /// A bulk replace is in flight.
    Updating,
    /// The last check or apply failed; cached records remain usable.
    Error,
}

/// Configuration for the sync controller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The remote dataset endpoint (single GET returning the bulk payload;
    /// HEAD on the same URL yields the revision marker).
    pub endpoint: String,
    /// Name of the primary key field inside each dataset item.
    pub key_field: String,
}

impl SyncConfig {
    /// Creates a config with the default key field (`"id"`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key_field: "id".to_string(),
        }
    }

    /// Sets the primary key field name.
    #[must_use]
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }
}

/// Decides whether a refresh is needed and performs the atomic replace.
///
/// The controller compares the remote revision marker (from a cheap HEAD
/// probe) against the locally persisted one and drives [`SyncState`]
/// accordingly. It never applies an update over previously loaded data
/// without being asked: when both markers exist and differ it emits
/// [`EngineEvent::UpdateAvailable`] and leaves the stale replica visible
/// until the caller invokes [`SyncController::apply_update`]. The one
/// exception is the first-ever load (no local marker), which bootstraps
/// silently.
pub struct SyncController<B: StorageBackend, F: Fetcher, S: EventSink> {
    config: SyncConfig,
    store: Arc<LocalStore<B>>,
    fetcher: Arc<F>,
    sink: Arc<S>,
    state: RwLock<SyncState>,
    apply_lock: tokio::sync::Mutex<()>,
}

impl<B, F, S> SyncController<B, F, S>
where
    B: StorageBackend + 'static,
    F: Fetcher,
    S: EventSink,
{
    /// Creates a new sync controller.
    pub fn new(config: SyncConfig, store: Arc<LocalStore<B>>, fetcher: Arc<F>, sink: Arc<S>) -> Self {
        Self {
            config,
            store,
            fetcher,
            sink,
            state: RwLock::new(SyncState::Unknown),
            apply_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the current sync state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Checks whether the remote dataset has a newer revision.
    ///
    /// Idempotent: with no remote change this settles on
    /// [`SyncState::UpToDate`] and issues zero writes.
    ///
    /// A probe transport failure is offline mode, not an error: the
    /// state becomes [`SyncState::Error`] and the call returns it,
    /// leaving cached records usable. `Err` is reserved for local store
    /// failures.
    ///
    /// While a replace is in flight this returns
    /// [`SyncState::Updating`] without probing.
    pub async fn check_for_update(&self) -> EngineResult<SyncState> {
        // An in-flight replace owns the state until it commits; a check
        // racing it must report Updating, never flip the state under it.
        if self.apply_lock.try_lock().is_err() {
            debug!("replace in flight, skipping revision check");
            return Ok(SyncState::Updating);
        }
        self.set_state(SyncState::Checking);

        let probe = self.fetcher.fetch(&Request::head(&self.config.endpoint)).await;
        let remote_marker = match probe {
            Err(e) => {
                warn!(error = %e, "revision probe failed, staying on cached records");
                self.set_state(SyncState::Error);
                return Ok(SyncState::Error);
            }
            Ok(resp) if !resp.is_ok() => {
                warn!(status = resp.status, "revision probe returned non-2xx");
                self.set_state(SyncState::Error);
                return Ok(SyncState::Error);
            }
            Ok(resp) => match resp.last_modified {
                Some(marker) => marker,
                None => {
                    // No marker from the origin: degrade to treating every
                    // check as changed rather than silently skipping updates.
                    let fabricated = fallback_marker();
                    debug!(marker = %fabricated, "origin provided no revision marker");
                    fabricated
                }
            },
        };

        let local_marker = self.store.metadata(REVISION_MARKER_KEY);
        match local_marker {
            None => {
                // First-ever load: fetch the full dataset with no prompt.
                info!("no local revision marker, bootstrapping dataset");
                self.bootstrap(&remote_marker).await
            }
            Some(local) if local != remote_marker => {
                debug!(local = %local, remote = %remote_marker, "dataset update detected");
                self.set_state(SyncState::UpdateAvailable);
                self.sink.emit(EngineEvent::UpdateAvailable {
                    marker: remote_marker,
                });
                Ok(SyncState::UpdateAvailable)
            }
            Some(_) => {
                if self.store.is_empty() {
                    // Marker claims freshness but there is no data: repair.
                    warn!("store is empty despite matching markers, forcing resync");
                    self.bootstrap(&remote_marker).await
                } else {
                    self.set_state(SyncState::UpToDate);
                    Ok(SyncState::UpToDate)
                }
            }
        }
    }

    /// Fetches the dataset and atomically replaces the local replica.
    ///
    /// Serialized against itself: at most one replace is in flight at a
    /// time, and the state reads [`SyncState::Updating`] for its whole
    /// duration.
    pub async fn apply_update(&self, marker: &str) -> EngineResult<ReplaceOutcome> {
        let _guard = self.apply_lock.lock().await;
        self.set_state(SyncState::Updating);

        let response = match self.fetcher.fetch(&Request::get(&self.config.endpoint)).await {
            Ok(resp) => resp,
            Err(e) => {
                self.set_state(SyncState::Error);
                return Err(EngineError::Transport(e.to_string()));
            }
        };
        if !response.is_ok() {
            self.set_state(SyncState::Error);
            return Err(EngineError::Transport(format!(
                "dataset fetch returned status {}",
                response.status
            )));
        }

        let records = match parse_dataset(&response.body, &self.config.key_field) {
            Ok(records) => records,
            Err(e) => {
                self.set_state(SyncState::Error);
                return Err(e);
            }
        };

        match self.store.replace_all(&records, marker) {
            Ok(outcome) => {
                info!(
                    written = outcome.written,
                    skipped = outcome.skipped,
                    marker,
                    "dataset replace committed"
                );
                self.set_state(SyncState::UpToDate);
                Ok(outcome)
            }
            Err(e) => {
                self.set_state(SyncState::Error);
                Err(e.into())
            }
        }
    }

    /// Silent full fetch used for first-run bootstrap and inconsistency
    /// repair. Transport/payload failures degrade to offline mode.
    async fn bootstrap(&self, marker: &str) -> EngineResult<SyncState> {
        match self.apply_update(marker).await {
            Ok(_) => Ok(self.state()),
            Err(e) if e.is_offline_recoverable() => {
                warn!(error = %e, "bootstrap failed, operating on cached records");
                Ok(SyncState::Error)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fabricated marker for origins that expose no revision information.
fn fallback_marker() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("epoch-{secs}")
}

/// Parses the bulk dataset payload into records.
///
/// Accepts a JSON array of objects, or a map whose values are arrays of
/// objects (flattened). Items missing the key field become empty-key
/// records, which the store counts as skipped without aborting the batch.
fn parse_dataset(body: &[u8], key_field: &str) -> EngineResult<Vec<Record>> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| EngineError::Payload(e.to_string()))?;

    let items: Vec<serde_json::Value> = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map
            .into_iter()
            .flat_map(|(_, v)| match v {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            })
            .collect(),
        _ => {
            return Err(EngineError::Payload(
                "dataset must be an array or a map of arrays".to_string(),
            ))
        }
    };

    if items.is_empty() {
        return Err(EngineError::Payload("dataset is empty".to_string()));
    }

    let records = items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(obj) => {
                let key = obj
                    .get(key_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let attrs: BTreeMap<String, serde_json::Value> = obj.into_iter().collect();
                Record::new(key, attrs)
            }
            // Non-object items carry no key and get skipped by the store.
            _ => Record::with_key(""),
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use offsync_cache::{FetchResult, Method, MockFetcher, Response};
    use offsync_store::InMemoryBackend;
    use std::future::Future;

    const ENDPOINT: &str = "./cards.json";

    fn dataset(n: usize) -> String {
        let items: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"cardNumber":"OP01-{i:03}","name":"card {i}"}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    fn controller(
        fetcher: Arc<MockFetcher>,
        sink: Arc<MemorySink>,
    ) -> SyncController<InMemoryBackend, MockFetcher, MemorySink> {
        let store = Arc::new(LocalStore::open(InMemoryBackend::new()).unwrap());
        SyncController::new(
            SyncConfig::new(ENDPOINT).with_key_field("cardNumber"),
            store,
            fetcher,
            sink,
        )
    }

    fn probe_response(marker: &str) -> Response {
        Response::ok("").last_modified(marker)
    }

    #[tokio::test]
    async fn first_run_bootstraps_silently() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.respond(ENDPOINT, Response::ok(dataset(5)));

        let controller = controller(Arc::clone(&fetcher), Arc::clone(&sink));
        let state = controller.check_for_update().await.unwrap();

        assert_eq!(state, SyncState::UpToDate);
        assert_eq!(controller.store.record_count(), 5);
        assert_eq!(
            controller.store.metadata(REVISION_MARKER_KEY).unwrap(),
            "rev-1"
        );
        // No prompt on the bootstrap path.
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn second_check_is_idempotent() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.respond(ENDPOINT, Response::ok(dataset(3)));

        let controller = controller(Arc::clone(&fetcher), sink);
        assert_eq!(
            controller.check_for_update().await.unwrap(),
            SyncState::UpToDate
        );
        assert_eq!(
            controller.check_for_update().await.unwrap(),
            SyncState::UpToDate
        );

        // One bootstrap fetch; the second check wrote nothing.
        assert_eq!(fetcher.fetch_count(ENDPOINT), 1);
        assert_eq!(fetcher.head_count(ENDPOINT), 2);
    }

    #[tokio::test]
    async fn changed_marker_prompts_instead_of_applying() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.respond_head(ENDPOINT, probe_response("rev-2"));
        fetcher.respond(ENDPOINT, Response::ok(dataset(2)));

        let controller = controller(Arc::clone(&fetcher), Arc::clone(&sink));
        controller.check_for_update().await.unwrap();
        let before = controller.store.records();

        let state = controller.check_for_update().await.unwrap();
        assert_eq!(state, SyncState::UpdateAvailable);
        // Stale data stays visible until the caller applies.
        assert_eq!(controller.store.records(), before);
        assert_eq!(
            sink.events(),
            vec![EngineEvent::UpdateAvailable {
                marker: "rev-2".into()
            }]
        );
    }

    #[tokio::test]
    async fn apply_update_replaces_and_advances_marker() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.respond(ENDPOINT, Response::ok(dataset(2)));
        fetcher.respond(ENDPOINT, Response::ok(dataset(4)));

        let controller = controller(Arc::clone(&fetcher), sink);
        controller.check_for_update().await.unwrap();

        let outcome = controller.apply_update("rev-2").await.unwrap();
        assert_eq!(outcome.written, 4);
        assert_eq!(controller.state(), SyncState::UpToDate);
        assert_eq!(
            controller.store.metadata(REVISION_MARKER_KEY).unwrap(),
            "rev-2"
        );
    }

    #[tokio::test]
    async fn matching_marker_with_empty_store_forces_resync() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.respond(ENDPOINT, Response::ok(dataset(3)));

        let controller = controller(Arc::clone(&fetcher), sink);
        // Simulate the inconsistency: marker present, no records.
        controller
            .store
            .set_metadata(REVISION_MARKER_KEY, "rev-1")
            .unwrap();

        let state = controller.check_for_update().await.unwrap();
        assert_eq!(state, SyncState::UpToDate);
        assert_eq!(controller.store.record_count(), 3);
    }

    #[tokio::test]
    async fn probe_failure_is_offline_mode() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.fail_head(ENDPOINT);

        let controller = controller(Arc::clone(&fetcher), Arc::clone(&sink));
        controller.store.put(Record::with_key("OP01-001")).unwrap();

        let state = controller.check_for_update().await.unwrap();
        assert_eq!(state, SyncState::Error);
        // Cached records remain usable.
        assert_eq!(controller.store.record_count(), 1);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn missing_marker_degrades_to_treat_as_changed() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        // Probe succeeds but exposes no Last-Modified.
        fetcher.respond_head(ENDPOINT, Response::ok(""));
        fetcher.respond(ENDPOINT, Response::ok(dataset(2)));

        let controller = controller(Arc::clone(&fetcher), Arc::clone(&sink));

        // Empty store: bootstrap with a fabricated marker, no prompt.
        let state = controller.check_for_update().await.unwrap();
        assert_eq!(state, SyncState::UpToDate);
        assert!(controller
            .store
            .metadata(REVISION_MARKER_KEY)
            .unwrap()
            .starts_with("epoch-"));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_transport_failure_degrades_to_error_state() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond_head(ENDPOINT, probe_response("rev-1"));
        fetcher.fail(ENDPOINT);

        let controller = controller(Arc::clone(&fetcher), sink);
        let state = controller.check_for_update().await.unwrap();
        assert_eq!(state, SyncState::Error);
        assert!(controller.store.is_empty());
        // No marker was committed for a replace that never happened.
        assert!(controller.store.metadata(REVISION_MARKER_KEY).is_none());
    }

    #[tokio::test]
    async fn non_2xx_dataset_fetch_is_a_transport_error() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond(ENDPOINT, Response::with_status(500, "oops"));

        let controller = controller(Arc::clone(&fetcher), sink);
        let result = controller.apply_update("rev-1").await;
        assert!(matches!(result, Err(EngineError::Transport(_))));
        assert_eq!(controller.state(), SyncState::Error);
    }

    #[tokio::test]
    async fn empty_dataset_is_rejected() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond(ENDPOINT, Response::ok("[]"));

        let controller = controller(Arc::clone(&fetcher), sink);
        let result = controller.apply_update("rev-1").await;
        assert!(matches!(result, Err(EngineError::Payload(_))));
        assert!(controller.store.metadata(REVISION_MARKER_KEY).is_none());
    }

    #[tokio::test]
    async fn map_of_arrays_payload_is_flattened() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond(
            ENDPOINT,
            Response::ok(
                r#"{"OP01":[{"cardNumber":"OP01-001"}],"OP02":[{"cardNumber":"OP02-001"}]}"#,
            ),
        );

        let controller = controller(Arc::clone(&fetcher), sink);
        let outcome = controller.apply_update("rev-1").await.unwrap();
        assert_eq!(outcome.written, 2);
        assert!(controller.store.get("OP02-001").is_some());
    }

    /// Delegates to a [`MockFetcher`] but holds every GET at an await
    /// point until the gate is released, so a test can observe the
    /// controller mid-replace.
    struct GatedFetcher {
        inner: MockFetcher,
        gate: Arc<tokio::sync::Notify>,
    }

    impl Fetcher for GatedFetcher {
        fn fetch(&self, request: &Request) -> impl Future<Output = FetchResult> + Send {
            let gated = request.method == Method::Get;
            let gate = Arc::clone(&self.gate);
            let outcome = self.inner.fetch(request);
            async move {
                if gated {
                    gate.notified().await;
                }
                outcome.await
            }
        }
    }

    #[tokio::test]
    async fn state_reads_updating_while_replace_is_in_flight() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let inner = MockFetcher::new();
        inner.respond_head(ENDPOINT, probe_response("rev-1"));
        inner.respond(ENDPOINT, Response::ok(dataset(2)));
        let fetcher = Arc::new(GatedFetcher {
            inner,
            gate: Arc::clone(&gate),
        });
        let sink = Arc::new(MemorySink::new());
        let store = Arc::new(LocalStore::open(InMemoryBackend::new()).unwrap());
        store.put(Record::with_key("OP01-000")).unwrap();
        store.set_metadata(REVISION_MARKER_KEY, "rev-1").unwrap();
        let controller = Arc::new(SyncController::new(
            SyncConfig::new(ENDPOINT).with_key_field("cardNumber"),
            Arc::clone(&store),
            fetcher,
            sink,
        ));

        let apply = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.apply_update("rev-2").await }
        });

        // Let the replace reach its dataset fetch, then observe it.
        tokio::task::yield_now().await;
        assert_eq!(controller.state(), SyncState::Updating);

        // A concurrent check must not flip the state while the replace
        // holds the apply lock, even with matching markers.
        assert_eq!(
            controller.check_for_update().await.unwrap(),
            SyncState::Updating
        );
        assert_eq!(controller.state(), SyncState::Updating);

        gate.notify_one();
        let outcome = apply.await.unwrap().unwrap();
        assert_eq!(outcome.written, 2);
        assert_eq!(controller.state(), SyncState::UpToDate);
    }

    #[tokio::test]
    async fn items_without_key_are_skipped_marker_still_commits() {
        let fetcher = Arc::new(MockFetcher::new());
        let sink = Arc::new(MemorySink::new());
        fetcher.respond(
            ENDPOINT,
            Response::ok(r#"[{"cardNumber":"OP01-001"},{"name":"keyless"}]"#),
        );

        let controller = controller(Arc::clone(&fetcher), sink);
        let outcome = controller.apply_update("rev-9").await.unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(
            controller.store.metadata(REVISION_MARKER_KEY).unwrap(),
            "rev-9"
        );
    }
}
