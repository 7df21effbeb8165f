//! Outbound HTTP transport.

mod http;

pub use http::HttpTransport;

use crate::request::ShapedRequest;
use async_trait::async_trait;

/// Sends a shaped request and hands back the raw, unconsumed response.
///
/// Implementations must not interpret status codes; a non-2xx answer is still `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ShapedRequest) -> Result<reqwest::Response, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
