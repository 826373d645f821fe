//! Reddit OAuth client
//!
//! Token exchange: `POST access_token` with HTTP Basic client credentials
//! and a form body. Identity: `GET /api/v1/me` with the bearer token.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::{AccessGrant, Identity, IdentityProvider, ProviderError};
use crate::config::RedditConfig;
use crate::error::AppError;
use crate::metrics::observe_provider_request;

/// Error body Reddit sends with a 200 status on a bad or reused code
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: serde_json::Value,
}

/// Reddit implementation of [`IdentityProvider`]
pub struct RedditClient {
    http: reqwest::Client,
    config: RedditConfig,
}

impl RedditClient {
    /// Wrap an existing HTTP client.
    pub fn new(http: reqwest::Client, config: RedditConfig) -> Self {
        Self { http, config }
    }

    /// Build a client with the configured User-Agent and request timeout.
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialized
    pub fn from_config(config: RedditConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self::new(http, config))
    }

    async fn read_body(
        endpoint: &'static str,
        started: Instant,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<String, ProviderError> {
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                let error = ProviderError::from(error);
                let label = if matches!(error, ProviderError::Timeout) {
                    "timeout"
                } else {
                    "error"
                };
                observe_provider_request(endpoint, label, started.elapsed());
                return Err(error);
            }
        };

        let status = response.status();
        observe_provider_request(endpoint, status.as_str(), started.elapsed());

        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "Provider returned error status");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

fn describe_error_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn parse_grant(body: &str) -> Result<AccessGrant, ProviderError> {
    if let Ok(error_body) = serde_json::from_str::<OAuthErrorBody>(body) {
        return Err(ProviderError::Rejected(describe_error_value(&error_body.error)));
    }

    serde_json::from_str::<AccessGrant>(body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

pub(crate) fn parse_identity(body: &str) -> Result<Identity, ProviderError> {
    let identity = serde_json::from_str::<Identity>(body)
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if identity.username.is_empty() {
        return Err(ProviderError::Malformed(
            "identity response has an empty name".to_string(),
        ));
    }

    Ok(identity)
}

#[async_trait]
impl IdentityProvider for RedditClient {
    async fn exchange_code(&self, code: &str) -> Result<AccessGrant, ProviderError> {
        let started = Instant::now();
        let result = self
            .http
            .post(self.config.token_url.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await;

        let body = Self::read_body("token", started, result).await?;
        parse_grant(&body)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<Identity, ProviderError> {
        let started = Instant::now();
        let result = self
            .http
            .get(self.config.identity_url.clone())
            .bearer_auth(access_token)
            .send()
            .await;

        let body = Self::read_body("identity", started, result).await?;
        parse_identity(&body)
    }
}
