//! Base instructions for primary-backend requests that do not bring their own.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_INSTRUCTIONS_URL: &str =
    "https://raw.githubusercontent.com/openai/codex/main/codex-rs/core/prompt.md";

/// Used when the remote instructions cannot be fetched.
pub const FALLBACK_INSTRUCTIONS: &str = "You are a coding agent running in a terminal-based \
coding assistant. You are expected to be precise, safe, and helpful. Work through the user's \
request step by step, keep your answers concise, and prefer making concrete changes over \
describing them.";

#[async_trait]
pub trait InstructionsProvider: Send + Sync {
    /// Never fails: implementations return a fallback text instead.
    async fn base_instructions(&self) -> String;
}

/// Fixed instructions text.
#[derive(Debug, Clone)]
pub struct StaticInstructions(String);

impl StaticInstructions {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Default for StaticInstructions {
    fn default() -> Self {
        Self::new(FALLBACK_INSTRUCTIONS)
    }
}

#[async_trait]
impl InstructionsProvider for StaticInstructions {
    async fn base_instructions(&self) -> String {
        self.0.clone()
    }
}

/// Fetches instructions over HTTP on first use and keeps them for the process lifetime.
///
/// A failed fetch yields the fallback text and is not cached, so the next call tries again.
pub struct RemoteInstructions {
    client: reqwest::Client,
    url: String,
    fallback: String,
    cached: ArcSwapOption<String>,
}

impl RemoteInstructions {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "instructions client build failed; fetching without a timeout");
                reqwest::Client::new()
            });
        Self::with_client(client, url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            fallback: FALLBACK_INSTRUCTIONS.to_string(),
            cached: ArcSwapOption::empty(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    async fn fetch(&self) -> Option<String> {
        let resp = match self.client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = self.url.as_str(), error = %e, "instructions fetch failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(
                url = self.url.as_str(),
                http_status = resp.status().as_u16(),
                "instructions fetch returned non-success status"
            );
            return None;
        }
        match resp.text().await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!(url = self.url.as_str(), error = %e, "instructions body unreadable");
                None
            }
        }
    }
}

impl Default for RemoteInstructions {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS_URL)
    }
}

#[async_trait]
impl InstructionsProvider for RemoteInstructions {
    async fn base_instructions(&self) -> String {
        if let Some(text) = self.cached.load_full() {
            return text.as_ref().clone();
        }
        match self.fetch().await {
            Some(text) => {
                debug!(url = self.url.as_str(), bytes = text.len(), "cached base instructions");
                self.cached.store(Some(Arc::new(text.clone())));
                text
            }
            None => self.fallback.clone(),
        }
    }
}
