//! Response model shared by strategies, partitions, and the sync engine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A read response.
///
/// `synthetic` marks placeholder responses fabricated by a strategy when
/// neither the cache nor the network could produce a real payload.
/// Synthetic responses are never stored in a partition, and their status
/// (404 for a cache-first miss, 503 for an offline fallback) lets callers
/// tell a miss from a real payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code (2xx means success).
    pub status: u16,
    /// `Last-Modified` revision marker, when the origin provided one.
    pub last_modified: Option<String>,
    /// Response body.
    pub body: Bytes,
    /// True for fabricated offline placeholders.
    pub synthetic: bool,
}

impl Response {
    /// Creates a successful (200) response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            last_modified: None,
            body: body.into(),
            synthetic: false,
        }
    }

    /// Creates a response with an explicit status code.
    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            last_modified: None,
            body: body.into(),
            synthetic: false,
        }
    }

    /// Attaches a `Last-Modified` revision marker.
    #[must_use]
    pub fn last_modified(mut self, marker: impl Into<String>) -> Self {
        self.last_modified = Some(marker.into());
        self
    }

    /// Synthesized offline fallback (503 Service Unavailable).
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            status: 503,
            last_modified: None,
            body: Bytes::new(),
            synthetic: true,
        }
    }

    /// Synthesized cache-first miss (404 Not Found).
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: 404,
            last_modified: None,
            body: Bytes::new(),
            synthetic: true,
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(Response::ok("body").is_ok());
        assert!(Response::with_status(204, "").is_ok());
        assert!(!Response::with_status(404, "").is_ok());
        assert!(!Response::unavailable().is_ok());
    }

    #[test]
    fn synthetic_responses_are_distinct() {
        let miss = Response::not_found();
        let offline = Response::unavailable();
        assert!(miss.synthetic);
        assert!(offline.synthetic);
        assert_ne!(miss.status, offline.status);
    }

    #[test]
    fn last_modified_builder() {
        let resp = Response::ok("x").last_modified("Wed, 01 Jan 2026 00:00:00 GMT");
        assert_eq!(
            resp.last_modified.as_deref(),
            Some("Wed, 01 Jan 2026 00:00:00 GMT")
        );
    }
}
