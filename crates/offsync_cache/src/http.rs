//! HTTP implementation of the fetch seam (feature `http`).

use crate::fetch::{FetchResult, Fetcher, TransportError};
use crate::request::{Method, Request};
use crate::response::Response;
use std::future::Future;
use std::time::Duration;

/// A [`Fetcher`] backed by `reqwest`.
///
/// Probe-friendly: requests are sent with `Cache-Control: no-store` so
/// revision markers always come from the origin, never an intermediary
/// cache.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates an HTTP fetcher with a 30-second request timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the underlying client cannot be
    /// constructed.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates an HTTP fetcher from an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method_of(request: &Request) -> reqwest::Method {
        match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &Request) -> impl Future<Output = FetchResult> + Send {
        let builder = self
            .client
            .request(Self::method_of(request), &request.url)
            .header(reqwest::header::CACHE_CONTROL, "no-store");

        async move {
            let resp = builder
                .send()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;

            let status = resp.status().as_u16();
            let last_modified = resp
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp
                .bytes()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;

            let mut response = Response::with_status(status, body);
            response.last_modified = last_modified;
            Ok(response)
        }
    }
}
