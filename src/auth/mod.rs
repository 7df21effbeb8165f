//! Credential gateway.
//!
//! The dispatcher never stores or mutates credentials. It asks a [`CredentialGateway`]
//! for the current pair before each call and asks it to force a refresh after a 401.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CredentialGateway`] | Seam consumed by the dispatcher |
//! | [`StaticCredentialGateway`] | Fixed pair, no refresh |
//! | [`OAuthCredentialGateway`] | Refresh-token exchange with expiry bookkeeping |

mod jwt;
mod oauth;

pub use jwt::{account_id_from_jwt, expiry_from_jwt};
pub use oauth::{OAuthConfig, OAuthCredentialGateway, TokenSet};

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;

/// Access token and account id as reported by a gateway. Either may be missing.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub account_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            account_id: Some(account_id.into()),
        }
    }

    /// Both halves present and non-blank, or nothing.
    pub fn bearer(&self) -> Option<BearerCredentials> {
        let token = self.access_token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let account = self.account_id.as_deref().map(str::trim).filter(|a| !a.is_empty())?;
        Some(BearerCredentials {
            access_token: token.to_string(),
            account_id: account.to_string(),
        })
    }
}

/// A complete credential pair, usable for request headers.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredentials {
    pub access_token: String,
    pub account_id: String,
}

impl std::fmt::Debug for BearerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredentials")
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// Best-known valid pair, refreshed transparently if the gateway considers it expired.
    /// Fails when there is no credential material at all.
    async fn current(&self) -> Result<Credentials>;

    /// Unconditionally mint a new access token. `None` when refresh is impossible or failed.
    async fn force_refresh(&self) -> Option<Credentials>;

    /// Whether a 401 is worth a refresh-and-retry.
    fn supports_refresh(&self) -> bool {
        true
    }
}

/// Gateway over a fixed credential pair.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialGateway {
    credentials: Option<Credentials>,
}

impl StaticCredentialGateway {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    /// A gateway with no credential material.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialGateway for StaticCredentialGateway {
    async fn current(&self) -> Result<Credentials> {
        self.credentials.clone().ok_or_else(|| {
            Error::auth_with_context(
                "no credentials configured",
                ErrorContext::new().with_source("static_gateway"),
            )
        })
    }

    async fn force_refresh(&self) -> Option<Credentials> {
        None
    }

    fn supports_refresh(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_requires_both_halves() {
        assert!(Credentials::new("tok", "acct").bearer().is_some());
        assert!(Credentials::new("", "acct").bearer().is_none());
        assert!(Credentials::new("tok", "  ").bearer().is_none());
        assert!(Credentials {
            access_token: Some("tok".into()),
            account_id: None
        }
        .bearer()
        .is_none());
        assert!(Credentials::default().bearer().is_none());
    }

    #[test]
    fn debug_output_hides_tokens() {
        let creds = Credentials::new("secret-token", "acct-1");
        let rendered = format!("{:?} {:?}", creds, creds.bearer());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("acct-1"));
    }

    #[tokio::test]
    async fn static_gateway_never_refreshes() {
        let gateway = StaticCredentialGateway::new(Credentials::new("tok", "acct"));
        assert_eq!(
            gateway.current().await.unwrap(),
            Credentials::new("tok", "acct")
        );
        assert!(gateway.force_refresh().await.is_none());
        assert!(!gateway.supports_refresh());
        assert!(StaticCredentialGateway::empty().current().await.is_err());
    }
}
