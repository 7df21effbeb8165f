use crate::transport::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// A successful upstream response, body not yet consumed.
///
/// Forward [`bytes_stream`](Self::bytes_stream) to the client as-is; the relay never
/// parses the event stream.
#[derive(Debug)]
pub struct UpstreamResponse {
    inner: reqwest::Response,
}

impl UpstreamResponse {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn bytes_stream(self) -> BoxStream<'static, Bytes> {
        Box::pin(
            self.inner
                .bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e))),
        )
    }

    /// Buffer the whole body. Mostly useful in tests and non-streaming callers.
    pub async fn text(self) -> Result<String> {
        self.inner
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    pub fn into_inner(self) -> reqwest::Response {
        self.inner
    }
}
