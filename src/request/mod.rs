//! 请求整形：为主后端与本地后端分别构建 URL、请求头与请求体。
//!
//! Request shaping: `(url, headers, body)` for either backend.
//!
//! The primary backend gets a structured responses-API body plus bearer, account, beta
//! and session headers. The alternate backend gets the caller's payload as-is and only a
//! content-type header.

use crate::auth::BearerCredentials;
use crate::config::RelayConfig;
use crate::error::DispatchError;
use crate::instructions::InstructionsProvider;
use crate::models::ModelCatalog;
use crate::session::SessionFingerprint;
use crate::types::reasoning::include_list;
use crate::types::{
    AlternateParams, DispatchTarget, PrimaryParams, ReasoningConfig, TargetKind, ToolChoice,
};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub const ACCOUNT_ID_HEADER: &str = "chatgpt-account-id";
pub const BETA_HEADER: &str = "openai-beta";
pub const BETA_RESPONSES: &str = "responses=experimental";
pub const SESSION_ID_HEADER: &str = "session_id";

/// A fully built outbound request. The body is serialized once and reused verbatim on retry.
#[derive(Debug, Clone)]
pub struct ShapedRequest {
    pub kind: TargetKind,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub fingerprint: Option<SessionFingerprint>,
}

impl ShapedRequest {
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }

    /// Header names only; values may carry secrets.
    pub fn header_names(&self) -> Vec<String> {
        self.headers.keys().map(|k| k.as_str().to_string()).collect()
    }
}

#[derive(Serialize)]
struct ResponsesPayload<'a> {
    model: String,
    instructions: String,
    input: &'a [Value],
    tools: &'a [Value],
    tool_choice: ToolChoice,
    parallel_tool_calls: bool,
    store: bool,
    stream: bool,
    include: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_cache_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a ReasoningConfig>,
}

pub struct RequestShaper {
    config: Arc<RelayConfig>,
    models: Arc<dyn ModelCatalog>,
    instructions: Arc<dyn InstructionsProvider>,
}

impl RequestShaper {
    pub fn new(
        config: Arc<RelayConfig>,
        models: Arc<dyn ModelCatalog>,
        instructions: Arc<dyn InstructionsProvider>,
    ) -> Self {
        Self {
            config,
            models,
            instructions,
        }
    }

    /// Shape a request for `target`. Primary targets require credentials.
    pub async fn shape(
        &self,
        target: &DispatchTarget,
        credentials: Option<&BearerCredentials>,
    ) -> Result<ShapedRequest, DispatchError> {
        match target {
            DispatchTarget::Primary(params) => {
                let credentials = credentials.ok_or(DispatchError::MissingCredentials)?;
                self.shape_primary(params, credentials).await
            }
            DispatchTarget::Alternate(params) => self.shape_alternate(params),
        }
    }

    pub async fn shape_primary(
        &self,
        params: &PrimaryParams,
        credentials: &BearerCredentials,
    ) -> Result<ShapedRequest, DispatchError> {
        let fingerprint =
            SessionFingerprint::compute(params.instructions.as_deref(), &params.input);

        let instructions = match &params.instructions {
            Some(text) => text.clone(),
            None => self.instructions.base_instructions().await,
        };

        let payload = ResponsesPayload {
            model: self
                .models
                .normalize_model_name(&params.model, self.config.model_override()),
            instructions,
            input: &params.input,
            tools: params.tools.as_deref().unwrap_or(&[]),
            tool_choice: params.tool_choice.clone().unwrap_or_default(),
            parallel_tool_calls: params.parallel_tool_calls.unwrap_or(false),
            store: false,
            stream: true,
            include: include_list(params.reasoning.as_ref()),
            prompt_cache_key: Some(fingerprint.as_str()),
            reasoning: params.reasoning.as_ref(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;

        Ok(ShapedRequest {
            kind: TargetKind::Primary,
            url: self.config.primary_endpoint_url.clone(),
            headers: primary_headers(credentials, Some(&fingerprint))?,
            body: Bytes::from(body),
            fingerprint: Some(fingerprint),
        })
    }

    pub fn shape_alternate(
        &self,
        params: &AlternateParams,
    ) -> Result<ShapedRequest, DispatchError> {
        let body = serde_json::to_vec(&params.payload)
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(ShapedRequest {
            kind: TargetKind::Alternate,
            url: format!("{}{}", self.config.alternate_base_url, params.path),
            headers,
            body: Bytes::from(body),
            fingerprint: None,
        })
    }

    /// Same URL and body, headers rebuilt from new credentials.
    pub fn reauthorize(
        &self,
        request: &ShapedRequest,
        credentials: &BearerCredentials,
    ) -> Result<ShapedRequest, DispatchError> {
        let headers = match request.kind {
            TargetKind::Primary => primary_headers(credentials, request.fingerprint.as_ref())?,
            TargetKind::Alternate => request.headers.clone(),
        };
        Ok(ShapedRequest {
            headers,
            ..request.clone()
        })
    }
}

fn header_value(name: &str, raw: &str) -> Result<HeaderValue, DispatchError> {
    HeaderValue::from_str(raw).map_err(|_| {
        DispatchError::InvalidRequest(format!("invalid characters in {} header", name))
    })
}

fn primary_headers(
    credentials: &BearerCredentials,
    fingerprint: Option<&SessionFingerprint>,
) -> Result<HeaderMap, DispatchError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut bearer = header_value(
        "authorization",
        &format!("Bearer {}", credentials.access_token),
    )?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(
        HeaderName::from_static(ACCOUNT_ID_HEADER),
        header_value(ACCOUNT_ID_HEADER, &credentials.account_id)?,
    );
    headers.insert(
        HeaderName::from_static(BETA_HEADER),
        HeaderValue::from_static(BETA_RESPONSES),
    );
    if let Some(fp) = fingerprint {
        headers.insert(
            HeaderName::from_static(SESSION_ID_HEADER),
            header_value(SESSION_ID_HEADER, fp.as_str())?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::StaticInstructions;
    use crate::models::DefaultModelCatalog;
    use crate::types::ENCRYPTED_REASONING_INCLUDE;
    use serde_json::json;

    fn shaper(config: RelayConfig) -> RequestShaper {
        RequestShaper::new(
            Arc::new(config),
            Arc::new(DefaultModelCatalog),
            Arc::new(StaticInstructions::new("base instructions")),
        )
    }

    fn creds(token: &str) -> BearerCredentials {
        BearerCredentials {
            access_token: token.into(),
            account_id: "acct-1".into(),
        }
    }

    fn input() -> Vec<Value> {
        vec![
            json!({"role": "user", "content": "first"}),
            json!({"type": "function_call_output", "call_id": "c1", "output": "ok"}),
        ]
    }

    #[tokio::test]
    async fn primary_body_has_fixed_and_default_fields() {
        let params = PrimaryParams::new("gpt-5-codex", input());
        let req = shaper(RelayConfig::default())
            .shape_primary(&params, &creds("tok"))
            .await
            .unwrap();
        let body = req.body_json().unwrap();

        assert_eq!(req.url, crate::config::DEFAULT_PRIMARY_ENDPOINT_URL);
        assert_eq!(body["model"], "gpt-5-codex");
        assert_eq!(body["instructions"], "base instructions");
        assert_eq!(body["input"], json!(input()));
        assert_eq!(body["tools"], json!([]));
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["store"], false);
        assert_eq!(body["stream"], true);
        assert_eq!(body["include"], json!([ENCRYPTED_REASONING_INCLUDE]));
        assert!(body.get("reasoning").is_none());

        let fp = req.fingerprint.as_ref().unwrap();
        assert_eq!(body["prompt_cache_key"], fp.as_str());
        assert_eq!(req.headers[SESSION_ID_HEADER], fp.as_str());
    }

    #[tokio::test]
    async fn primary_headers_carry_auth_account_beta_and_session() {
        let req = shaper(RelayConfig::default())
            .shape_primary(&PrimaryParams::new("gpt-5", input()), &creds("tok"))
            .await
            .unwrap();
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        assert_eq!(req.headers[AUTHORIZATION], "Bearer tok");
        assert!(req.headers[AUTHORIZATION].is_sensitive());
        assert_eq!(req.headers[ACCEPT], "text/event-stream");
        assert_eq!(req.headers[ACCOUNT_ID_HEADER], "acct-1");
        assert_eq!(req.headers[BETA_HEADER], BETA_RESPONSES);
        assert!(req.headers.contains_key(SESSION_ID_HEADER));
    }

    #[tokio::test]
    async fn explicit_fields_pass_through() {
        let tools = vec![
            json!({"type": "function", "name": "b", "parameters": {}}),
            json!({"type": "function", "name": "a", "parameters": {}}),
        ];
        let choice = json!({"type": "function", "function": {"name": "foo"}});
        let params = PrimaryParams::new("gpt-5", input())
            .instructions("custom")
            .tools(tools.clone())
            .tool_choice_value(&choice)
            .parallel_tool_calls(true)
            .reasoning(ReasoningConfig::new("high").with_summary("auto"));
        let body = shaper(RelayConfig::default())
            .shape_primary(&params, &creds("tok"))
            .await
            .unwrap()
            .body_json()
            .unwrap();

        assert_eq!(body["instructions"], "custom");
        assert_eq!(body["tools"], json!(tools));
        assert_eq!(body["tool_choice"], choice);
        assert_eq!(body["parallel_tool_calls"], true);
        assert_eq!(body["reasoning"], json!({"effort": "high", "summary": "auto"}));
        assert_eq!(body["include"], json!([ENCRYPTED_REASONING_INCLUDE]));
    }

    #[tokio::test]
    async fn bogus_tool_choice_falls_back_to_auto() {
        let params = PrimaryParams::new("gpt-5", input()).tool_choice_value(&json!("bogus"));
        let body = shaper(RelayConfig::default())
            .shape_primary(&params, &creds("tok"))
            .await
            .unwrap()
            .body_json()
            .unwrap();
        assert_eq!(body["tool_choice"], "auto");
    }

    #[tokio::test]
    async fn none_effort_omits_encrypted_reasoning() {
        let params = PrimaryParams::new("gpt-5", input()).reasoning(ReasoningConfig::new("none"));
        let body = shaper(RelayConfig::default())
            .shape_primary(&params, &creds("tok"))
            .await
            .unwrap()
            .body_json()
            .unwrap();
        assert_eq!(body["include"], json!([]));
        assert_eq!(body["reasoning"]["effort"], "none");
    }

    #[tokio::test]
    async fn debug_override_replaces_model() {
        let config = RelayConfig::default().with_debug_model_override("codex-mini");
        let body = shaper(config)
            .shape_primary(&PrimaryParams::new("gpt-5", input()), &creds("tok"))
            .await
            .unwrap()
            .body_json()
            .unwrap();
        assert_eq!(body["model"], "codex-mini-latest");
    }

    #[tokio::test]
    async fn fingerprint_uses_caller_instructions_and_input() {
        let params = PrimaryParams::new("gpt-5", input()).instructions("custom");
        let req = shaper(RelayConfig::default())
            .shape_primary(&params, &creds("tok"))
            .await
            .unwrap();
        assert_eq!(
            req.fingerprint,
            Some(SessionFingerprint::compute(Some("custom"), &input()))
        );
    }

    #[tokio::test]
    async fn alternate_request_is_payload_with_content_type_only() {
        let payload =
            json!({"model": "llama3", "messages": [], "stream": true, "tool_choice": "x"});
        let target = DispatchTarget::Alternate(AlternateParams::new("/api/chat", payload.clone()));
        let req = shaper(RelayConfig::default().with_alternate_base_url("http://127.0.0.1:11434"))
            .shape(&target, None)
            .await
            .unwrap();

        assert_eq!(req.url, "http://127.0.0.1:11434/api/chat");
        assert_eq!(req.body_json().unwrap(), payload);
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        assert!(req.fingerprint.is_none());
    }

    #[tokio::test]
    async fn primary_without_credentials_is_rejected() {
        let target = DispatchTarget::Primary(PrimaryParams::new("gpt-5", input()));
        let err = shaper(RelayConfig::default())
            .shape(&target, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingCredentials));
    }

    #[tokio::test]
    async fn reauthorize_swaps_headers_only() {
        let s = shaper(RelayConfig::default());
        let original = s
            .shape_primary(&PrimaryParams::new("gpt-5", input()), &creds("old"))
            .await
            .unwrap();
        let fresh = BearerCredentials {
            access_token: "new".into(),
            account_id: "acct-2".into(),
        };
        let retried = s.reauthorize(&original, &fresh).unwrap();

        assert_eq!(retried.url, original.url);
        assert_eq!(retried.body, original.body);
        assert_eq!(retried.headers[AUTHORIZATION], "Bearer new");
        assert_eq!(retried.headers[ACCOUNT_ID_HEADER], "acct-2");
        assert_eq!(
            retried.headers[SESSION_ID_HEADER],
            original.headers[SESSION_ID_HEADER]
        );
    }

    #[tokio::test]
    async fn control_characters_in_token_are_rejected() {
        let err = shaper(RelayConfig::default())
            .shape_primary(&PrimaryParams::new("gpt-5", input()), &creds("bad\ntoken"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
    }
}
