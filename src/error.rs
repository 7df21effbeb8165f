use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Structured error context for configuration and credential failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "primary_endpoint_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected format, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "oauth_refresh")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Library error for everything outside the dispatch boundary:
/// configuration loading, transport construction, credential exchange.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}{}", format_context(.context))]
    Auth {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn auth_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Auth {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Auth { context, .. } => Some(context),
            _ => None,
        }
    }
}

pub const MISSING_CREDENTIALS_MESSAGE: &str =
    "Missing ChatGPT credentials. Run 'codex login' first";
pub const TRANSPORT_FAILURE_PREFIX: &str = "Upstream ChatGPT request failed";
pub const GENERIC_UPSTREAM_MESSAGE: &str = "Upstream error";

/// Failure result of a dispatch.
///
/// Every variant converts to a JSON body `{"error": {"message": ...}}` with a status code;
/// nothing else crosses the dispatch boundary.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No usable access token or account id; no request was sent.
    #[error("{}", MISSING_CREDENTIALS_MESSAGE)]
    MissingCredentials,

    /// The request never produced an HTTP response.
    #[error("{}: {cause}", TRANSPORT_FAILURE_PREFIX)]
    Transport { cause: String },

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        body: Value,
        /// Set when this is a 401 that could not be recovered by refresh-and-retry.
        auth_expired: bool,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Failed to build upstream request: {0}")]
    InvalidRequest(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MissingCredentials => StatusCode::UNAUTHORIZED,
            DispatchError::Transport { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            // nginx's "client closed request"; always a valid code
            DispatchError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
            DispatchError::InvalidRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message carried in the error body.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// JSON error body in the shape `{"error": {"message": "..."}}`.
    pub fn to_json(&self) -> Value {
        json!({ "error": { "message": self.message() } })
    }

    /// Whether this is an unrecoverable 401 from the backend.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            DispatchError::Upstream {
                auth_expired: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_maps_to_401_with_login_hint() {
        let err = DispatchError::MissingCredentials;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            err.to_json(),
            json!({"error": {"message": "Missing ChatGPT credentials. Run 'codex login' first"}})
        );
    }

    #[test]
    fn transport_message_includes_cause() {
        let err = DispatchError::Transport {
            cause: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.message().starts_with("Upstream ChatGPT request failed"));
        assert!(err.message().contains("connection refused"));
    }

    #[test]
    fn upstream_status_is_mirrored() {
        let err = DispatchError::Upstream {
            status: 429,
            message: "slow down".into(),
            body: json!({"error": {"message": "slow down"}}),
            auth_expired: false,
        };
        assert_eq!(err.status().as_u16(), 429);
        assert_eq!(err.to_json()["error"]["message"], "slow down");
        assert!(!err.is_auth_expired());
    }

    #[test]
    fn context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "invalid URL",
            ErrorContext::new()
                .with_field_path("primary_endpoint_url")
                .with_source("config_loader"),
        );
        let text = err.to_string();
        assert!(text.contains("field: primary_endpoint_url"));
        assert!(text.contains("source: config_loader"));
        assert!(err.context().is_some());
    }
}
