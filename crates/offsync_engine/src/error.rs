//! Error types for the engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] offsync_store::StoreError),

    /// A cache partition failed.
    #[error("cache error: {0}")]
    Cache(#[from] offsync_cache::CacheError),

    /// The network failed while fetching the dataset payload.
    #[error("transport error: {0}")]
    Transport(String),

    /// The dataset payload was malformed or empty.
    #[error("invalid dataset payload: {0}")]
    Payload(String),

    /// A state machine was driven through an illegal transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl EngineError {
    /// Returns true when cached local data remains usable despite the error.
    ///
    /// Transport and payload failures leave the replica intact; store
    /// failures may not.
    pub fn is_offline_recoverable(&self) -> bool {
        matches!(self, EngineError::Transport(_) | EngineError::Payload(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_recoverable_classification() {
        assert!(EngineError::Transport("unreachable".into()).is_offline_recoverable());
        assert!(EngineError::Payload("empty".into()).is_offline_recoverable());
        assert!(!EngineError::Store(offsync_store::StoreError::EmptyKey).is_offline_recoverable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::InvalidTransition {
            from: "Idle".into(),
            to: "Activating".into(),
        };
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("Activating"));
    }
}
