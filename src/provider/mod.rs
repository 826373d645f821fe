//! Identity provider contract
//!
//! The authorization flow needs exactly two outbound calls:
//! - exchange an authorization code for an [`AccessGrant`]
//! - fetch the [`Identity`] the grant belongs to
//!
//! Both report failures as [`ProviderError`], which the flow surfaces as
//! `ProviderUnavailable` and never confuses with its own state checks.

mod reddit;

pub use reddit::RedditClient;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Token payload returned by the provider's token endpoint
///
/// Only lives in memory while the callback is handled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime relative to the moment of issuance
    pub expires_in: u64,
    /// Absent when the provider does not issue one
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// Minimal profile of the user a grant was issued to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    #[serde(rename = "name")]
    pub username: String,
}

/// Why a provider call produced no usable result
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request exceeded the configured timeout
    #[error("provider request timed out")]
    Timeout,

    /// Connection or protocol failure before a response arrived
    #[error("provider request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    /// Provider answered 2xx but the body carried an OAuth error
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    /// Body was missing fields or had the wrong shape
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(error)
        }
    }
}

/// Outbound calls of the authorization code flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a one-time authorization code for an access grant.
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, ProviderError>;

    /// Look up who the access token belongs to.
    async fn fetch_identity(&self, access_token: &str) -> Result<Identity, ProviderError>;
}
