//! # chatgpt-relay
//!
//! ChatGPT 中继的上游分发管线：请求整形、会话指纹、凭据获取，以及 401 时的单次刷新重试。
//!
//! Upstream dispatch pipeline for a chat-completion relay.
//!
//! The relay forwards requests either to the ChatGPT "responses" backend, authenticated
//! with OAuth bearer credentials, or to a locally trusted model server. It shapes the
//! request for the chosen backend, derives a session fingerprint for prompt caching, and
//! recovers from an expired access token with exactly one refresh-and-retry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatgpt_relay::auth::{OAuthConfig, OAuthCredentialGateway, TokenSet};
//! use chatgpt_relay::{Dispatcher, PrimaryParams, RelayConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> chatgpt_relay::Result<()> {
//!     let tokens =
//!         TokenSet::from_access_token("access-token").with_refresh_token("refresh-token");
//!     let dispatcher = Dispatcher::builder()
//!         .config(RelayConfig::from_env()?)
//!         .credentials(Arc::new(OAuthCredentialGateway::new(
//!             OAuthConfig::default(),
//!             Some(tokens),
//!         )))
//!         .build()?;
//!
//!     let params = PrimaryParams::new(
//!         "gpt-5",
//!         vec![serde_json::json!({"role": "user", "content": "Hello"})],
//!     );
//!     match dispatcher.dispatch(params).await {
//!         Ok(response) => {
//!             let _stream = response.bytes_stream();
//!             // forward the stream verbatim...
//!         }
//!         Err(err) => eprintln!("{} {}", err.status(), err.to_json()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Orchestrator state machine and its builder |
//! | [`request`] | Request shaping for both backends |
//! | [`session`] | Session fingerprints |
//! | [`auth`] | Credential gateway seam and implementations |
//! | [`transport`] | Outbound HTTP |
//! | [`observer`] | Lifecycle events for tracing and tests |
//! | [`config`] | Relay configuration |
//! | [`models`] | Model-name normalization |
//! | [`instructions`] | Base instructions providers |
//! | [`types`] | Call parameters |

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod instructions;
pub mod models;
pub mod observer;
pub mod request;
pub mod session;
pub mod transport;
pub mod types;

pub mod error;

pub use auth::{CredentialGateway, Credentials};
pub use config::RelayConfig;
pub use dispatch::{DispatchResult, Dispatcher, DispatcherBuilder, UpstreamResponse};
pub use error::{DispatchError, Error, ErrorContext};
pub use observer::{DispatchEvent, DispatchObserver};
pub use session::SessionFingerprint;
pub use types::{
    AlternateParams, DispatchTarget, PrimaryParams, ReasoningConfig, TargetKind, ToolChoice,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
