//! Claim extraction from unverified JWTs issued by the auth server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const AUTH_CLAIM: &str = "https://api.openai.com/auth";

fn payload(token: &str) -> Option<Value> {
    let segment = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// `chatgpt_account_id` from the auth claim, if present.
pub fn account_id_from_jwt(token: &str) -> Option<String> {
    payload(token)?
        .get(AUTH_CLAIM)?
        .get("chatgpt_account_id")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Expiry (`exp`) of the token. An `exp` beyond what `SystemTime` can hold reads as none.
pub fn expiry_from_jwt(token: &str) -> Option<SystemTime> {
    let exp = payload(token)?.get("exp")?.as_u64()?;
    UNIX_EPOCH.checked_add(Duration::from_secs(exp))
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.sig", header, body)
}
