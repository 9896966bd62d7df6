//! Deployment update lifecycle coordinator.

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSink};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Default bound on how long activation waits for confirmation.
const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-runtime-instance deployment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    /// No new deployment is known.
    Idle,
    /// A new artifact set is being fetched and verified in the background.
    Installing,
    /// A new version is fully installed but not yet controlling the client.
    Waiting,
    /// The adopt signal has been sent; waiting for confirmation.
    Activating,
    /// The new deployment controls the client.
    Active,
}

/// Capability over the host runtime's waiting deployment instance.
///
/// A thin adapter outside the core implements this against whatever the
/// runtime actually exposes; [`MockDeployment`] implements it for tests.
pub trait DeploymentHandle: Send + Sync + 'static {
    /// Instructs the waiting deployment to take control immediately.
    fn adopt(&self);

    /// Forces a full reload of the client; the fallback cutover.
    fn force_reload(&self);
}

struct Pending<D> {
    version: String,
    handle: Arc<D>,
}

/// Tracks the install/waiting/activate state machine and drives the
/// user-visible notification plus safe cutover.
///
/// Adoption is never automatic: `Waiting` holds until an explicit
/// [`LifecycleCoordinator::adopt`] call, so an in-progress user session
/// is never disrupted. Activation is bounded: if the runtime does not
/// confirm within the timeout, the coordinator forces a full reload so
/// the system cannot wait indefinitely.
pub struct LifecycleCoordinator<D: DeploymentHandle, S: EventSink> {
    sink: Arc<S>,
    state: RwLock<DeploymentState>,
    pending: RwLock<Option<Pending<D>>>,
    activated: Notify,
    activation_timeout: Duration,
}

impl<D: DeploymentHandle, S: EventSink> LifecycleCoordinator<D, S> {
    /// Creates a coordinator with the default 3-second activation timeout.
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            state: RwLock::new(DeploymentState::Idle),
            pending: RwLock::new(None),
            activated: Notify::new(),
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
        }
    }

    /// Overrides the activation timeout.
    #[must_use]
    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    /// Returns the current deployment state.
    pub fn state(&self) -> DeploymentState {
        *self.state.read()
    }

    /// A new artifact set was detected and is being installed.
    ///
    /// Invisible to the user; ignored while an activation is in flight.
    pub fn on_install_started(&self) {
        let mut state = self.state.write();
        if *state == DeploymentState::Activating {
            return;
        }
        debug!("deployment install started");
        *state = DeploymentState::Installing;
    }

    /// A new version finished installing and is now waiting.
    ///
    /// Raises [`EngineEvent::DeploymentWaiting`] exactly once per
    /// distinct pending version: a re-install of the same version while
    /// already waiting replaces the handle without re-notifying.
    pub fn on_installed(&self, version: impl Into<String>, handle: Arc<D>) {
        let version = version.into();
        let mut pending = self.pending.write();
        let already_notified = pending
            .as_ref()
            .is_some_and(|p| p.version == version);
        *pending = Some(Pending {
            version: version.clone(),
            handle,
        });
        drop(pending);
        *self.state.write() = DeploymentState::Waiting;

        if already_notified {
            debug!(version = %version, "pending deployment replaced, notification already armed");
        } else {
            info!(version = %version, "new deployment waiting");
            self.sink.emit(EngineEvent::DeploymentWaiting);
        }
    }

    /// User-approved cutover to the waiting deployment.
    ///
    /// Sends the adopt signal and waits for confirmation up to the
    /// activation timeout; on timeout the handle's `force_reload` is the
    /// fallback. Either way the coordinator settles in
    /// [`DeploymentState::Active`] and emits
    /// [`EngineEvent::DeploymentActive`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] unless the state is
    /// [`DeploymentState::Waiting`].
    pub async fn adopt(&self) -> EngineResult<()> {
        let handle = {
            let mut state = self.state.write();
            if *state != DeploymentState::Waiting {
                return Err(EngineError::InvalidTransition {
                    from: format!("{:?}", *state),
                    to: "Activating".to_string(),
                });
            }
            let Some(pending) = self.pending.read().as_ref().map(|p| Arc::clone(&p.handle))
            else {
                return Err(EngineError::InvalidTransition {
                    from: "Waiting (no pending deployment)".to_string(),
                    to: "Activating".to_string(),
                });
            };
            *state = DeploymentState::Activating;
            pending
        };

        info!("adopting waiting deployment");
        handle.adopt();

        match tokio::time::timeout(self.activation_timeout, self.activated.notified()).await {
            Ok(()) => debug!("deployment confirmed active"),
            Err(_) => {
                warn!("activation confirmation timed out, forcing reload");
                handle.force_reload();
            }
        }

        *self.state.write() = DeploymentState::Active;
        self.pending.write().take();
        self.sink.emit(EngineEvent::DeploymentActive);
        Ok(())
    }

    /// The runtime confirmed a controller change.
    ///
    /// During [`LifecycleCoordinator::adopt`] this resolves its wait;
    /// a spontaneous confirmation (activation initiated elsewhere) moves
    /// the state machine to `Active` directly.
    pub fn confirm_active(&self) {
        self.activated.notify_one();

        let mut state = self.state.write();
        match *state {
            DeploymentState::Activating | DeploymentState::Active => {}
            _ => {
                info!("deployment activated outside an adopt call");
                *state = DeploymentState::Active;
                drop(state);
                self.sink.emit(EngineEvent::DeploymentActive);
            }
        }
    }
}

/// A mock deployment handle for tests.
#[derive(Debug, Default)]
pub struct MockDeployment {
    adopted: AtomicBool,
    reloads: AtomicU64,
}

impl MockDeployment {
    /// Creates a fresh mock handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `adopt` has been signalled.
    #[must_use]
    pub fn adopted(&self) -> bool {
        self.adopted.load(Ordering::SeqCst)
    }

    /// How many times `force_reload` fired.
    #[must_use]
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl DeploymentHandle for MockDeployment {
    fn adopt(&self) {
        self.adopted.store(true, Ordering::SeqCst);
    }

    fn force_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    fn coordinator(
        sink: Arc<MemorySink>,
    ) -> LifecycleCoordinator<MockDeployment, MemorySink> {
        LifecycleCoordinator::new(sink).with_activation_timeout(Duration::from_millis(50))
    }

    #[test]
    fn install_then_waiting_notifies_once() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));

        c.on_install_started();
        assert_eq!(c.state(), DeploymentState::Installing);

        c.on_installed("v2", Arc::new(MockDeployment::new()));
        assert_eq!(c.state(), DeploymentState::Waiting);
        assert_eq!(sink.events(), vec![EngineEvent::DeploymentWaiting]);
    }

    #[test]
    fn reinstall_same_version_does_not_renotify() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));

        c.on_installed("v2", Arc::new(MockDeployment::new()));
        c.on_installed("v2", Arc::new(MockDeployment::new()));

        assert_eq!(
            sink.count_matching(|e| *e == EngineEvent::DeploymentWaiting),
            1
        );
    }

    #[test]
    fn new_version_while_waiting_rearms_notification_once() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));

        c.on_installed("v2", Arc::new(MockDeployment::new()));
        c.on_installed("v3", Arc::new(MockDeployment::new()));
        c.on_installed("v3", Arc::new(MockDeployment::new()));

        assert_eq!(
            sink.count_matching(|e| *e == EngineEvent::DeploymentWaiting),
            2
        );
        assert_eq!(c.state(), DeploymentState::Waiting);
    }

    #[tokio::test]
    async fn adopt_with_confirmation_activates() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));
        let handle = Arc::new(MockDeployment::new());
        c.on_installed("v2", Arc::clone(&handle));

        // Confirmation arrives before the wait (the permit is stored).
        c.confirm_active();
        c.adopt().await.unwrap();

        assert!(handle.adopted());
        assert_eq!(handle.reload_count(), 0);
        assert_eq!(c.state(), DeploymentState::Active);
        assert_eq!(
            sink.events(),
            vec![EngineEvent::DeploymentWaiting, EngineEvent::DeploymentActive]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn adopt_timeout_forces_reload() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));
        let handle = Arc::new(MockDeployment::new());
        c.on_installed("v2", Arc::clone(&handle));

        // No confirmation ever arrives; paused time elapses instantly.
        c.adopt().await.unwrap();

        assert!(handle.adopted());
        assert_eq!(handle.reload_count(), 1);
        assert_eq!(c.state(), DeploymentState::Active);
        assert_eq!(
            sink.count_matching(|e| *e == EngineEvent::DeploymentActive),
            1
        );
    }

    #[tokio::test]
    async fn adopt_requires_waiting_state() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(sink);

        let result = c.adopt().await;
        assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));
        assert_eq!(c.state(), DeploymentState::Idle);
    }

    #[test]
    fn spontaneous_confirmation_activates() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(Arc::clone(&sink));

        c.confirm_active();
        assert_eq!(c.state(), DeploymentState::Active);
        assert_eq!(sink.events(), vec![EngineEvent::DeploymentActive]);

        // A duplicate confirmation is a no-op.
        c.confirm_active();
        assert_eq!(
            sink.count_matching(|e| *e == EngineEvent::DeploymentActive),
            1
        );
    }

    #[test]
    fn install_event_ignored_while_activating() {
        let sink = Arc::new(MemorySink::new());
        let c = coordinator(sink);
        *c.state.write() = DeploymentState::Activating;

        c.on_install_started();
        assert_eq!(c.state(), DeploymentState::Activating);
    }
}
