//! Error types for the cache layer.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The durable backend failed.
    #[error("partition storage error: {0}")]
    Store(#[from] offsync_store::StoreError),

    /// Routing configuration is invalid (overlapping rule sets).
    #[error("invalid route config: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheError::Config("endpoint overlaps asset prefix".into());
        assert!(err.to_string().contains("endpoint overlaps"));
    }
}
