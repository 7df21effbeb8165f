//! Relay configuration.
//!
//! Everything the dispatch pipeline needs to know about its surroundings lives in
//! [`RelayConfig`], passed into the [`Dispatcher`](crate::dispatch::Dispatcher) when it is
//! built. Values can come from code, from the environment, or from a YAML file.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PRIMARY_ENDPOINT_URL: &str = "https://chatgpt.com/backend-api/codex/responses";
pub const DEFAULT_ALTERNATE_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Fixed "responses" endpoint of the primary backend.
    pub primary_endpoint_url: String,
    /// Base URL of the alternate (local model) backend; request paths are appended verbatim.
    pub alternate_base_url: String,
    /// Replaces the caller's model name before normalization when set.
    pub debug_model_override: Option<String>,
    /// Whole-request timeout. `None` leaves the HTTP client's defaults in place.
    #[serde(with = "optional_secs")]
    pub request_timeout: Option<Duration>,
    pub proxy_url: Option<String>,
    /// Idle keep-alive connections kept per upstream host.
    pub pool_max_idle_per_host: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            primary_endpoint_url: DEFAULT_PRIMARY_ENDPOINT_URL.to_string(),
            alternate_base_url: DEFAULT_ALTERNATE_BASE_URL.to_string(),
            debug_model_override: None,
            request_timeout: None,
            proxy_url: None,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RelayConfig {
    /// Build a configuration from `RELAY_*` environment variables, falling back to defaults.
    ///
    /// - `RELAY_PRIMARY_ENDPOINT_URL`
    /// - `RELAY_ALTERNATE_BASE_URL`
    /// - `RELAY_DEBUG_MODEL`
    /// - `RELAY_HTTP_TIMEOUT_SECS`
    /// - `RELAY_PROXY_URL`
    /// - `RELAY_HTTP_POOL_MAX_IDLE_PER_HOST`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            primary_endpoint_url: non_empty_var("RELAY_PRIMARY_ENDPOINT_URL")
                .unwrap_or(defaults.primary_endpoint_url),
            alternate_base_url: non_empty_var("RELAY_ALTERNATE_BASE_URL")
                .unwrap_or(defaults.alternate_base_url),
            debug_model_override: non_empty_var("RELAY_DEBUG_MODEL"),
            request_timeout: non_empty_var("RELAY_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            proxy_url: non_empty_var("RELAY_PROXY_URL"),
            pool_max_idle_per_host: non_empty_var("RELAY_HTTP_POOL_MAX_IDLE_PER_HOST")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.pool_max_idle_per_host),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn with_primary_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.primary_endpoint_url = url.into();
        self
    }

    pub fn with_alternate_base_url(mut self, url: impl Into<String>) -> Self {
        self.alternate_base_url = url.into();
        self
    }

    pub fn with_debug_model_override(mut self, model: impl Into<String>) -> Self {
        self.debug_model_override = Some(model.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Check that both backend URLs are absolute http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        check_http_url("primary_endpoint_url", &self.primary_endpoint_url)?;
        check_http_url("alternate_base_url", &self.alternate_base_url)?;
        if let Some(proxy) = &self.proxy_url {
            check_http_url("proxy_url", proxy)?;
        }
        Ok(())
    }

    /// Debug override, ignoring blank values.
    pub fn model_override(&self) -> Option<&str> {
        self.debug_model_override
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

fn check_http_url(field: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid URL '{}'", raw),
            ErrorContext::new()
                .with_field_path(field)
                .with_details(e.to_string())
                .with_source("config_loader"),
        )
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::configuration_with_context(
            format!("unsupported URL scheme '{}'", other),
            ErrorContext::new()
                .with_field_path(field)
                .with_details("expected http or https")
                .with_source("config_loader"),
        )),
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(d)?;
        Ok(secs.filter(|s| *s > 0).map(Duration::from_secs))
    }
}
