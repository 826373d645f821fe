//! Reddit authorization code flow
//!
//! Two phases correlated only by the browser session:
//!
//! 1. [`AuthorizationFlow::start`] binds a fresh [`StateToken`] to the
//!    session and returns the provider's authorization URL.
//! 2. [`AuthorizationFlow::complete`] checks the returned state, exchanges
//!    the code, looks up the user and upserts their [`UserTokenInfo`].
//!
//! Per session: `NoPendingFlow -> PendingFlow (start) -> NoPendingFlow
//! (complete)`. Starting again replaces the pending state, so only the most
//! recent flow of a session can complete.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::session::{SessionId, SessionStore};
use super::state::StateToken;
use crate::data::{TokenRepository, UserTokenInfo};
use crate::error::AuthFlowError;
use crate::metrics::{AUTH_FLOWS_COMPLETED_TOTAL, AUTH_FLOWS_STARTED_TOTAL};
use crate::provider::IdentityProvider;

/// Session key holding the pending state (16 raw bytes)
pub const PENDING_STATE_KEY: &str = "reddit-state";

/// Source of the wall-clock instant used for token expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deployment-time parameters of the authorization request
#[derive(Debug, Clone)]
pub struct AuthorizeParams {
    pub authorize_url: Url,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

/// Query parameters of the provider callback
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Orchestrates session, provider and token repository
pub struct AuthorizationFlow {
    params: AuthorizeParams,
    sessions: Arc<dyn SessionStore>,
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<dyn TokenRepository>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationFlow {
    pub fn new(
        params: AuthorizeParams,
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<dyn TokenRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            params,
            sessions,
            provider,
            tokens,
            clock,
        }
    }

    /// Begin a flow for `session`
    ///
    /// Writes the new state to the session (replacing any pending one) and
    /// returns the URL the browser must be redirected to. No network access.
    pub async fn start(&self, session: &SessionId) -> Result<Url, AuthFlowError> {
        let state = StateToken::generate();

        self.sessions
            .set(session, PENDING_STATE_KEY, state.to_bytes().to_vec())
            .await
            .map_err(|e| AuthFlowError::SessionUnavailable(e.into()))?;

        AUTH_FLOWS_STARTED_TOTAL.inc();
        tracing::debug!("Authorization flow started");

        Ok(self.authorize_url(&state))
    }

    fn authorize_url(&self, state: &StateToken) -> Url {
        let mut url = self.params.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.params.client_id)
            .append_pair("response_type", "code")
            .append_pair("state", &state.to_string())
            .append_pair("redirect_uri", &self.params.redirect_uri)
            .append_pair("duration", "permanent")
            .append_pair("scope", &self.params.scope);
        url
    }

    /// Finish the flow from the provider callback
    ///
    /// `session` is `None` when the request carried no valid session cookie.
    ///
    /// # Errors
    /// Any failure aborts the attempt; nothing is persisted unless every
    /// step succeeded.
    pub async fn complete(
        &self,
        session: Option<&SessionId>,
        callback: &CallbackParams,
    ) -> Result<UserTokenInfo, AuthFlowError> {
        let result = self.complete_inner(session, callback).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.kind(),
        };
        AUTH_FLOWS_COMPLETED_TOTAL
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn complete_inner(
        &self,
        session: Option<&SessionId>,
        callback: &CallbackParams,
    ) -> Result<UserTokenInfo, AuthFlowError> {
        if let Some(error) = callback.error.as_deref().filter(|e| !e.is_empty()) {
            tracing::info!(provider_error = %error, "Provider denied authorization");
            return Err(AuthFlowError::ProviderDenied(error.to_string()));
        }

        let session = session.ok_or(AuthFlowError::MissingSession)?;
        let expected = self.take_pending_state(session).await?;

        let returned = callback.state.as_deref().and_then(StateToken::parse);
        if returned != Some(expected) {
            tracing::warn!("Authorization callback state does not match session");
            return Err(AuthFlowError::StateMismatch);
        }

        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AuthFlowError::MissingCode)?;

        // Taken before the round trips so request latency does not shorten the stored expiry.
        let now = self.clock.now();

        let grant = self.provider.exchange_code(code).await.map_err(|e| {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            AuthFlowError::ProviderUnavailable(e)
        })?;

        let identity = self
            .provider
            .fetch_identity(&grant.access_token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Identity lookup failed");
                AuthFlowError::ProviderUnavailable(e)
            })?;

        let expires_in = i64::try_from(grant.expires_in).unwrap_or(i64::MAX);
        let token = UserTokenInfo {
            username: identity.username,
            access_token: grant.access_token,
            token_type: grant.token_type,
            expires_at: now.timestamp().saturating_add(expires_in),
            refresh_token: grant.refresh_token,
            scope: grant.scope,
        };

        self.tokens.save(&token).await.map_err(|e| {
            tracing::error!(error = %e, username = %token.username, "Failed to store user token");
            AuthFlowError::StorageFailure(e.into())
        })?;

        tracing::info!(
            username = %token.username,
            expires_at = token.expires_at,
            "User token stored"
        );

        Ok(token)
    }

    /// Remove the pending state from the session and return it
    ///
    /// The read and the delete are one store operation, so two callbacks
    /// racing on the same session cannot both pass the state check.
    async fn take_pending_state(&self, session: &SessionId) -> Result<StateToken, AuthFlowError> {
        let stored = self
            .sessions
            .take(session, PENDING_STATE_KEY)
            .await
            .map_err(|e| AuthFlowError::SessionUnavailable(e.into()))?
            .ok_or(AuthFlowError::MissingSession)?;

        StateToken::from_bytes(&stored).ok_or_else(|| {
            tracing::warn!(len = stored.len(), "Discarding unreadable pending state");
            AuthFlowError::MissingSession
        })
    }
}
