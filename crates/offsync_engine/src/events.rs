//! Engine→UI event channel.
//!
//! The engine never renders anything: it emits events and the UI
//! collaborator decides how to present them (toast, prompt, progress
//! bar). Events are emitted after the state they describe is committed.

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A newer dataset revision exists; the caller decides when to apply.
    UpdateAvailable {
        /// The remote revision marker to pass back to `apply_update`.
        marker: String,
    },
    /// A new deployment is installed and waiting for adoption.
    DeploymentWaiting,
    /// The new deployment has taken control.
    DeploymentActive,
    /// Prefetch progress, emitted after every processed item.
    PrefetchProgress {
        /// Items processed so far (monotonically non-decreasing).
        completed: usize,
        /// Total items in the job.
        total: usize,
        /// Items that failed so far.
        failed: usize,
    },
}

/// Where engine events go.
pub trait EventSink: Send + Sync + 'static {
    /// Delivers one event. Must not block.
    fn emit(&self, event: EngineEvent);
}

/// An [`EventSink`] forwarding into a tokio channel.
///
/// A closed receiver drops events silently: the engine keeps working
/// when nobody is listening.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    /// Wraps an unbounded sender.
    #[must_use]
    pub fn new(tx: UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver closed, dropping event");
        }
    }
}

/// An [`EventSink`] recording events for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Counts recorded events matching a predicate.
    pub fn count_matching(&self, predicate: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
