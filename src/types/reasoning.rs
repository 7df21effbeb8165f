//! Reasoning configuration forwarded to the primary backend.

use serde::{Deserialize, Serialize};

/// Include entry requesting encrypted reasoning items back from the backend.
pub const ENCRYPTED_REASONING_INCLUDE: &str = "reasoning.encrypted_content";

/// `(effort, summary)` pair. The effort is an opaque, backend-defined level
/// (`none`, `minimal`, `low`, `medium`, `high`, ...) forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ReasoningConfig {
    pub fn new(effort: impl Into<String>) -> Self {
        Self {
            effort: effort.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Effort `none` turns reasoning off, so there is no encrypted content to ask for.
    pub fn disables_reasoning(&self) -> bool {
        self.effort == "none"
    }
}

/// The `include` list for a request with the given reasoning configuration.
pub fn include_list(reasoning: Option<&ReasoningConfig>) -> Vec<String> {
    match reasoning {
        Some(r) if r.disables_reasoning() => Vec::new(),
        _ => vec![ENCRYPTED_REASONING_INCLUDE.to_string()],
    }
}
