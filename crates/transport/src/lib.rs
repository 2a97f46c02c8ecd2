//! Transport abstraction for the dashboard API
//!
//! Defines the `Transport` trait: the single "issue request" seam every layer
//! above talks through. `HttpTransport` sends over reqwest with a fixed
//! end-to-end timeout; tests substitute in-memory doubles that count calls.
//!
//! Requests and responses at this level are already in wire form: snake_case
//! bodies, flattened query pairs, raw response bytes. Case translation and
//! credential handling live in the layers above.

pub mod http;

pub use http::HttpTransport;

use bytes::Bytes;
use keycase::Form;
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::pin::Pin;

/// Request body in wire form.
#[derive(Debug, Clone, Default)]
pub enum WireBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Multipart form; the transport picks the boundary and content type.
    Multipart(Form),
}

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, e.g. `/chatbots/7/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: WireBody,
}

impl WireRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: WireBody::Empty,
        }
    }
}

/// A response as received, body unparsed.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures below the HTTP status layer. A response with any status code,
/// 4xx and 5xx included, is not a `TransportError`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Sends wire requests.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "http")
    fn id(&self) -> &str;

    /// Send one request and return the response, whatever its status.
    fn send<'a>(
        &'a self,
        request: WireRequest,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range_is_2xx() {
        let response = |status| WireResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(301).is_success());
        assert!(!response(401).is_success());
        assert!(!response(500).is_success());
    }

    #[test]
    fn new_request_is_empty() {
        let request = WireRequest::new(Method::GET, "/events/");
        assert!(request.query.is_empty());
        assert!(request.headers.is_empty());
        assert!(matches!(request.body, WireBody::Empty));
    }

    #[test]
    fn transport_error_messages_carry_detail() {
        assert!(
            TransportError::Timeout("after 30s".into())
                .to_string()
                .contains("after 30s")
        );
        let debug = format!("{:?}", TransportError::Request("refused".into()));
        assert!(debug.contains("Request"), "got: {debug}");
    }
}
