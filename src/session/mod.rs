//! Session fingerprints.
//!
//! A fingerprint correlates one logical conversation turn with the backend's prompt
//! cache. It is sent both as `prompt_cache_key` in the body and as the session header.
//! It is not a security token.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionFingerprint(String);

impl SessionFingerprint {
    /// Digest of `instructions + "|" + serialized input`.
    ///
    /// Missing instructions hash as the empty string. Input is serialized with
    /// `serde_json`, so item order matters and object keys are emitted in a stable order.
    pub fn compute(instructions: Option<&str>, input: &[Value]) -> Self {
        let serialized = serde_json::to_string(input).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(instructions.unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(serialized.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
