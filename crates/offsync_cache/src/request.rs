//! Request model for the read boundary.

use serde::{Deserialize, Serialize};

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Idempotent read.
    Get,
    /// Metadata-only read (used for revision probes).
    Head,
    /// Non-safe methods; never intercepted.
    Post,
    /// Non-safe methods; never intercepted.
    Put,
    /// Non-safe methods; never intercepted.
    Delete,
    /// Non-safe methods; never intercepted.
    Patch,
}

/// An intercepted read request. Cache identity is method + URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute or scope-relative URL.
    pub url: String,
}

impl Request {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
        }
    }

    /// Creates a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::Head,
            url: url.into(),
        }
    }
}
