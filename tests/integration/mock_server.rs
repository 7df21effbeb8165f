//! Mock upstream server and scripted credential gateway

use async_trait::async_trait;
use chatgpt_relay::auth::CredentialGateway;
use chatgpt_relay::instructions::StaticInstructions;
use chatgpt_relay::observer::RecordingObserver;
use chatgpt_relay::request::ShapedRequest;
use chatgpt_relay::transport::{HttpTransport, Transport, TransportError};
use chatgpt_relay::{
    Credentials, Dispatcher, DispatcherBuilder, Error, ErrorContext, RelayConfig,
};
use mockito::{Mock, Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const RESPONSES_PATH: &str = "/backend-api/codex/responses";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn config(&self) -> RelayConfig {
        RelayConfig::default()
            .with_primary_endpoint_url(format!("{}{}", self.base_url, RESPONSES_PATH))
            .with_alternate_base_url(&self.base_url)
    }

    /// Builder wired to this server, with fixed base instructions and a recording observer
    pub fn builder(
        &self,
        gateway: Arc<ScriptedGateway>,
        observer: RecordingObserver,
    ) -> DispatcherBuilder {
        test_builder(self.config(), gateway, observer)
    }

    pub fn dispatcher(
        &self,
        gateway: Arc<ScriptedGateway>,
        observer: RecordingObserver,
    ) -> Dispatcher {
        self.builder(gateway, observer)
            .build()
            .expect("dispatcher builds")
    }

    /// Successful SSE stream for requests carrying `Bearer <token>`
    pub async fn mock_sse_stream(&self, token: &str, body: &str, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", RESPONSES_PATH)
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .expect(expect)
            .create_async()
            .await
    }

    /// Error response for requests carrying `Bearer <token>`
    pub async fn mock_error_response(
        &self,
        token: &str,
        status: usize,
        error_body: &str,
        expect: usize,
    ) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", RESPONSES_PATH)
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .expect(expect)
            .create_async()
            .await
    }

    /// Any request to the primary endpoint
    pub async fn mock_any_primary(&self, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", RESPONSES_PATH)
            .with_status(200)
            .expect(expect)
            .create_async()
            .await
    }
}

pub fn test_builder(
    config: RelayConfig,
    gateway: Arc<ScriptedGateway>,
    observer: RecordingObserver,
) -> DispatcherBuilder {
    Dispatcher::builder()
        .config(config)
        .credentials(gateway)
        .instructions(Arc::new(StaticInstructions::new("base instructions")))
        .observer(Arc::new(observer))
}

/// Upstream that accepts TCP connections and never answers.
///
/// Keep the listener alive for the duration of the test.
pub async fn silent_upstream() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent upstream");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{}{}", addr, RESPONSES_PATH))
}

/// Real HTTP for the first `healthy` sends, connection failures afterwards
pub struct FlakyTransport {
    inner: HttpTransport,
    healthy: usize,
    sends: AtomicUsize,
}

impl FlakyTransport {
    pub fn new(config: &RelayConfig, healthy: usize) -> Self {
        Self {
            inner: HttpTransport::new(config).expect("transport builds"),
            healthy,
            sends: AtomicUsize::new(0),
        }
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, request: &ShapedRequest) -> Result<reqwest::Response, TransportError> {
        if self.sends.fetch_add(1, Ordering::SeqCst) < self.healthy {
            self.inner.send(request).await
        } else {
            Err(TransportError::Other("connection reset by peer".to_string()))
        }
    }
}

/// Credential gateway with scripted answers and call counters
pub struct ScriptedGateway {
    current: Option<Credentials>,
    refreshed: Option<Credentials>,
    can_refresh: bool,
    pub current_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(current: Credentials) -> Self {
        Self {
            current: Some(current),
            refreshed: None,
            can_refresh: true,
            current_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// `current()` fails outright
    pub fn failing() -> Self {
        Self {
            current: None,
            ..Self::new(Credentials::default())
        }
    }

    pub fn refreshing_to(mut self, refreshed: Credentials) -> Self {
        self.refreshed = Some(refreshed);
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.can_refresh = false;
        self
    }

    pub fn current_count(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialGateway for ScriptedGateway {
    async fn current(&self) -> chatgpt_relay::Result<Credentials> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.current.clone().ok_or_else(|| {
            Error::auth_with_context("no auth material", ErrorContext::new().with_source("test"))
        })
    }

    async fn force_refresh(&self) -> Option<Credentials> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed.clone()
    }

    fn supports_refresh(&self) -> bool {
        self.can_refresh
    }
}
