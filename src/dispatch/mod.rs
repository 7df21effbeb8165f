//! 分发编排：获取凭据、整形请求、发送；主后端返回 401 时至多刷新并重试一次。
//!
//! Dispatch orchestration.
//!
//! One call walks `AcquireCredentials -> Shape -> Send`, and at most once through
//! `AuthRetry` when the primary backend answers 401 and the gateway can refresh.
//! There is no backoff and no retry for any other status.

mod builder;
mod response;

pub use builder::DispatcherBuilder;
pub use response::UpstreamResponse;

use crate::auth::{BearerCredentials, CredentialGateway};
use crate::config::RelayConfig;
use crate::error::{DispatchError, GENERIC_UPSTREAM_MESSAGE};
use crate::observer::{DispatchEvent, DispatchObserver};
use crate::request::{RequestShaper, ShapedRequest};
use crate::transport::Transport;
use crate::types::{DispatchTarget, TargetKind};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub type DispatchResult = std::result::Result<UpstreamResponse, DispatchError>;

/// Relays requests to the configured backends.
///
/// Stateless across calls; the only shared state is whatever the credential gateway holds.
pub struct Dispatcher {
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) credentials: Arc<dyn CredentialGateway>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) shaper: RequestShaper,
    pub(crate) observer: Arc<dyn DispatchObserver>,
}

/// Non-2xx answer with its body parsed best-effort.
#[derive(Debug)]
struct UpstreamFailure {
    status: StatusCode,
    body: Value,
}

impl UpstreamFailure {
    async fn read(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let fallback = || json!({ "raw": status.canonical_reason().unwrap_or("") });
        let body = match resp.text().await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| fallback()),
            Err(e) => {
                debug!(error = %e, "failed to read upstream error body");
                fallback()
            }
        };
        Self { status, body }
    }

    fn into_error(self, kind: TargetKind) -> DispatchError {
        let message = self
            .body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_UPSTREAM_MESSAGE)
            .to_string();
        DispatchError::Upstream {
            status: self.status.as_u16(),
            message,
            body: self.body,
            auth_expired: kind == TargetKind::Primary && self.status == StatusCode::UNAUTHORIZED,
        }
    }
}

enum Attempt {
    First,
    /// Carries the original 401, which is what the caller sees if the retry fails too.
    Retry(UpstreamFailure),
}

impl Attempt {
    fn number(&self) -> u32 {
        match self {
            Attempt::First => 0,
            Attempt::Retry(_) => 1,
        }
    }
}

enum Stage {
    AcquireCredentials,
    Shape(Option<BearerCredentials>),
    Send {
        request: ShapedRequest,
        attempt: Attempt,
    },
    AuthRetry {
        request: ShapedRequest,
        original: UpstreamFailure,
    },
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Send `target` upstream and return the raw response, or a structured failure.
    pub async fn dispatch(&self, target: impl Into<DispatchTarget>) -> DispatchResult {
        let target = target.into();
        let request_id = Uuid::new_v4().to_string();
        self.run(&target, &request_id).await
    }

    /// Like [`dispatch`](Self::dispatch), but gives up with [`DispatchError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn dispatch_with_cancel(
        &self,
        target: impl Into<DispatchTarget>,
        cancel: CancellationToken,
    ) -> DispatchResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.dispatch(target) => result,
        }
    }

    async fn run(&self, target: &DispatchTarget, request_id: &str) -> DispatchResult {
        let mut stage = Stage::AcquireCredentials;
        loop {
            stage = match stage {
                Stage::AcquireCredentials => match target.kind() {
                    // The local backend is trusted and takes no bearer credentials.
                    TargetKind::Alternate => Stage::Shape(None),
                    TargetKind::Primary => match self.acquire_credentials().await {
                        Some(credentials) => Stage::Shape(Some(credentials)),
                        None => return Err(DispatchError::MissingCredentials),
                    },
                },

                Stage::Shape(credentials) => Stage::Send {
                    request: self.shaper.shape(target, credentials.as_ref()).await?,
                    attempt: Attempt::First,
                },

                Stage::Send { request, attempt } => {
                    let number = attempt.number();
                    let resp = self.send(&request, request_id, number).await?;
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(UpstreamResponse::new(resp));
                    }

                    match attempt {
                        Attempt::Retry(original) => {
                            debug!(
                                request_id,
                                retry_status = status.as_u16(),
                                "retry after refresh failed; returning original 401"
                            );
                            return Err(original.into_error(request.kind));
                        }
                        Attempt::First => {
                            let failure = UpstreamFailure::read(resp).await;
                            if status == StatusCode::UNAUTHORIZED
                                && request.kind == TargetKind::Primary
                                && self.credentials.supports_refresh()
                            {
                                Stage::AuthRetry {
                                    request,
                                    original: failure,
                                }
                            } else {
                                return Err(failure.into_error(request.kind));
                            }
                        }
                    }
                }

                Stage::AuthRetry { request, original } => {
                    self.observe(DispatchEvent::RetryTriggered {
                        request_id: request_id.to_string(),
                    });
                    match self.credentials.force_refresh().await.and_then(|c| c.bearer()) {
                        Some(fresh) => Stage::Send {
                            request: self.shaper.reauthorize(&request, &fresh)?,
                            attempt: Attempt::Retry(original),
                        },
                        None => {
                            self.observe(DispatchEvent::RefreshUnavailable {
                                request_id: request_id.to_string(),
                            });
                            return Err(original.into_error(request.kind));
                        }
                    }
                }
            };
        }
    }

    async fn acquire_credentials(&self) -> Option<BearerCredentials> {
        match self.credentials.current().await {
            Ok(credentials) => credentials.bearer(),
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                None
            }
        }
    }

    async fn send(
        &self,
        request: &ShapedRequest,
        request_id: &str,
        attempt: u32,
    ) -> std::result::Result<reqwest::Response, DispatchError> {
        self.observe(DispatchEvent::RequestBuilt {
            request_id: request_id.to_string(),
            target: request.kind,
            url: request.url.clone(),
            header_names: request.header_names(),
            attempt,
        });

        match self.transport.send(request).await {
            Ok(resp) => {
                self.observe(DispatchEvent::ResponseReceived {
                    request_id: request_id.to_string(),
                    status: resp.status().as_u16(),
                    attempt,
                });
                Ok(resp)
            }
            Err(e) => {
                self.observe(DispatchEvent::TransportFailed {
                    request_id: request_id.to_string(),
                    error: e.to_string(),
                    attempt,
                });
                Err(DispatchError::Transport {
                    cause: e.to_string(),
                })
            }
        }
    }

    fn observe(&self, event: DispatchEvent) {
        self.observer.on_event(&event);
    }
}
