//! Error types for the local store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the local store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error from the storage backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted snapshot could not be decoded.
    ///
    /// This is fatal at open: the store refuses to silently discard
    /// data it cannot interpret.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Another process holds the store lock.
    #[error("store is locked by another process: {path}")]
    Locked {
        /// Path to the lock file.
        path: String,
    },

    /// A record with an empty primary key was rejected.
    #[error("record primary key must not be empty")]
    EmptyKey,

    /// Snapshot encoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Creates a codec error from any encode/decode failure.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::EmptyKey;
        assert_eq!(err.to_string(), "record primary key must not be empty");

        let err = StoreError::Locked {
            path: "/tmp/db/LOCK".into(),
        };
        assert!(err.to_string().contains("/tmp/db/LOCK"));
    }
}
