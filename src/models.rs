//! Model-name normalization.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maps caller-facing model names onto names the primary backend accepts.
pub trait ModelCatalog: Send + Sync {
    /// `debug_override`, when present, replaces `model` before normalization.
    fn normalize_model_name(&self, model: &str, debug_override: Option<&str>) -> String;
}

pub const DEFAULT_MODEL: &str = "gpt-5";

static CODEX_FAMILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^gpt-5(\.\d+)?-codex").expect("valid codex pattern"));
static CODEX_MINI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^codex-mini").expect("valid codex-mini pattern"));

/// Catalog for the ChatGPT responses backend.
///
/// - `provider/` prefixes are stripped and names are lowercased
/// - `gpt-5-codex*` becomes `gpt-5-codex`, `codex-mini*` becomes `codex-mini-latest`
/// - any other `gpt-5*` becomes `gpt-5`
/// - unknown names fall back to [`DEFAULT_MODEL`]
#[derive(Debug, Clone, Default)]
pub struct DefaultModelCatalog;

impl ModelCatalog for DefaultModelCatalog {
    fn normalize_model_name(&self, model: &str, debug_override: Option<&str>) -> String {
        let chosen = debug_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(model);
        let bare = chosen.rsplit('/').next().unwrap_or(chosen).trim().to_lowercase();

        if CODEX_FAMILY.is_match(&bare) {
            "gpt-5-codex".to_string()
        } else if CODEX_MINI.is_match(&bare) {
            "codex-mini-latest".to_string()
        } else {
            DEFAULT_MODEL.to_string()
        }
    }
}

/// Forwards the model name untouched (apart from the debug override).
#[derive(Debug, Clone, Default)]
pub struct PassthroughModelCatalog;

impl ModelCatalog for PassthroughModelCatalog {
    fn normalize_model_name(&self, model: &str, debug_override: Option<&str>) -> String {
        debug_override
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(model)
            .to_string()
    }
}
