//! Error types for SnekNet
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Failures of the authorization flow are reported as `AuthFlowError`
//! so callers can tell each kind apart for logging and metrics.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::provider::ProviderError;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Authorization flow failure (400/500/502 depending on kind)
    #[error(transparent)]
    AuthFlow(#[from] AuthFlowError),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing/verification error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Terminal failures of one authorization attempt
///
/// None of these are retried; the user has to start the flow again.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// The provider redirected back with an `error` parameter
    #[error("Authorization denied by provider: {0}")]
    ProviderDenied(String),

    /// No pending state for this session (expired, never started, or forged)
    #[error("No pending authorization for this session")]
    MissingSession,

    /// Returned state is absent, unparseable or different from the stored one
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// State matched but the callback carried no authorization code
    #[error("Authorization code missing from callback")]
    MissingCode,

    /// Token exchange or identity lookup failed
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),

    /// Session store could not be read or written
    #[error("Session store unavailable: {0}")]
    SessionUnavailable(#[source] anyhow::Error),

    /// Token record could not be saved
    #[error("Failed to store token: {0}")]
    StorageFailure(#[source] anyhow::Error),
}

impl AuthFlowError {
    /// Stable label used in logs and the `error_type` metric
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFlowError::ProviderDenied(_) => "provider_denied",
            AuthFlowError::MissingSession => "missing_session",
            AuthFlowError::StateMismatch => "state_mismatch",
            AuthFlowError::MissingCode => "missing_code",
            AuthFlowError::ProviderUnavailable(_) => "provider_unavailable",
            AuthFlowError::SessionUnavailable(_) => "session_unavailable",
            AuthFlowError::StorageFailure(_) => "storage_failure",
        }
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthFlowError::ProviderDenied(message) => (StatusCode::BAD_REQUEST, message.clone()),
            // Kept generic so a forged callback learns nothing about why it failed.
            AuthFlowError::MissingSession
            | AuthFlowError::StateMismatch
            | AuthFlowError::MissingCode => (StatusCode::BAD_REQUEST, "Bad request".to_string()),
            AuthFlowError::ProviderUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "Identity provider unavailable".to_string(),
            ),
            AuthFlowError::SessionUnavailable(_) | AuthFlowError::StorageFailure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::AuthFlow(flow_error) => {
                let (status, message) = flow_error.status_and_message();
                (status, message, flow_error.kind())
            }
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "encryption")
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
