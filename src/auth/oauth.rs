use super::jwt::{account_id_from_jwt, expiry_from_jwt};
use super::{CredentialGateway, Credentials};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";
pub const DEFAULT_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const DEFAULT_SCOPE: &str = "openid profile email";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub scope: String,
    /// Tokens expiring within this window count as expired.
    pub refresh_skew: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            refresh_skew: Duration::from_secs(300),
        }
    }
}

/// Token material held by the gateway. Hosts persist it via [`OAuthCredentialGateway::snapshot`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub account_id: Option<String>,
    pub expires_at: Option<SystemTime>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("account_id", &self.account_id)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

impl TokenSet {
    /// Build from an access token, deriving account id and expiry from its claims.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        Self {
            account_id: account_id_from_jwt(&access_token),
            expires_at: expiry_from_jwt(&access_token),
            access_token,
            refresh_token: None,
            id_token: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_expires_at(mut self, at: SystemTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    fn is_expiring(&self, skew: Duration) -> bool {
        match self.expires_at {
            // A skew past the end of representable time covers every expiry.
            Some(at) => SystemTime::now()
                .checked_add(skew)
                .map_or(true, |deadline| deadline >= at),
            None => false,
        }
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            access_token: Some(self.access_token.clone()),
            account_id: self.account_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    grant_type: &'a str,
    refresh_token: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Gateway backed by an OAuth refresh-token grant.
///
/// Refreshes are serialized behind an async mutex; a caller that waited for another
/// caller's refresh reuses its result instead of exchanging the refresh token again.
pub struct OAuthCredentialGateway {
    client: reqwest::Client,
    config: OAuthConfig,
    tokens: ArcSwapOption<TokenSet>,
    refresh_lock: Mutex<()>,
}

impl OAuthCredentialGateway {
    pub fn new(config: OAuthConfig, tokens: Option<TokenSet>) -> Self {
        Self::with_client(reqwest::Client::new(), config, tokens)
    }

    pub fn with_client(
        client: reqwest::Client,
        config: OAuthConfig,
        tokens: Option<TokenSet>,
    ) -> Self {
        Self {
            client,
            config,
            tokens: ArcSwapOption::from(tokens.map(Arc::new)),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current token material, for persistence by the host.
    pub fn snapshot(&self) -> Option<TokenSet> {
        self.tokens.load_full().map(|t| t.as_ref().clone())
    }

    /// Replace the token material (e.g. after a fresh login).
    pub fn replace(&self, tokens: TokenSet) {
        self.tokens.store(Some(Arc::new(tokens)));
    }

    async fn exchange(&self, current: &TokenSet, refresh_token: &str) -> Result<TokenSet> {
        let body = RefreshRequest {
            client_id: &self.config.client_id,
            grant_type: "refresh_token",
            refresh_token,
            scope: &self.config.scope,
        };
        let resp = self
            .client
            .post(&self.config.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(crate::transport::TransportError::Http(e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::auth_with_context(
                format!("token refresh rejected with HTTP {}", status.as_u16()),
                ErrorContext::new()
                    .with_details(text)
                    .with_source("oauth_refresh"),
            ));
        }

        let parsed: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| Error::Transport(crate::transport::TransportError::Http(e)))?;

        let account_id = parsed
            .id_token
            .as_deref()
            .and_then(account_id_from_jwt)
            .or_else(|| account_id_from_jwt(&parsed.access_token))
            .or_else(|| current.account_id.clone());
        let expires_at = parsed
            .expires_in
            .and_then(|secs| SystemTime::now().checked_add(Duration::from_secs(secs)))
            .or_else(|| expiry_from_jwt(&parsed.access_token));

        Ok(TokenSet {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token.or_else(|| current.refresh_token.clone()),
            id_token: parsed.id_token.or_else(|| current.id_token.clone()),
            account_id,
            expires_at,
        })
    }

    /// Refresh unless someone else already replaced `observed` while we waited.
    async fn refresh_from(&self, observed: Option<Arc<TokenSet>>) -> Option<Arc<TokenSet>> {
        let _guard = self.refresh_lock.lock().await;
        let latest = self.tokens.load_full();

        let changed = match (&observed, &latest) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            debug!("reusing credentials refreshed by a concurrent caller");
            return latest;
        }

        let current = latest?;
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            debug!("no refresh token held; refresh unavailable");
            return None;
        };

        match self.exchange(&current, refresh_token).await {
            Ok(next) => {
                info!(
                    account_id = next.account_id.as_deref().unwrap_or(""),
                    "refreshed access token"
                );
                let next = Arc::new(next);
                self.tokens.store(Some(next.clone()));
                Some(next)
            }
            Err(e) => {
                warn!(error = %e, "access token refresh failed");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialGateway for OAuthCredentialGateway {
    async fn current(&self) -> Result<Credentials> {
        let Some(tokens) = self.tokens.load_full() else {
            return Err(Error::auth_with_context(
                "no credential material stored",
                ErrorContext::new().with_source("oauth_gateway"),
            ));
        };

        if tokens.is_expiring(self.config.refresh_skew) && tokens.refresh_token.is_some() {
            if let Some(fresh) = self.refresh_from(Some(tokens.clone())).await {
                return Ok(fresh.credentials());
            }
            // Keep the stale token; the backend's 401 triggers the forced refresh path.
        }
        Ok(tokens.credentials())
    }

    async fn force_refresh(&self) -> Option<Credentials> {
        let observed = self.tokens.load_full();
        self.refresh_from(observed)
            .await
            .map(|tokens| tokens.credentials())
    }

    fn supports_refresh(&self) -> bool {
        self.tokens
            .load_full()
            .map(|t| t.refresh_token.is_some())
            .unwrap_or(false)
    }
}
