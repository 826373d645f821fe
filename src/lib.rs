//! SnekNet - Reddit login that keeps each user's OAuth tokens
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /auth, /auth/check, /auth/success                        │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Authorization Flow                          │
//! │  - CSRF state bound to the server-side session              │
//! │  - Code exchange + identity lookup (Reddit)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx), one token record per username             │
//! │  - In-memory session cache (moka)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Metrics endpoint
//! - `auth`: Authorization flow, sessions and login routes
//! - `provider`: Identity provider client (Reddit)
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Server-side sessions (volatile)
    pub sessions: Arc<auth::MemorySessionStore>,

    /// Reddit authorization flow
    pub auth_flow: Arc<auth::AuthorizationFlow>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Initialize session store
    /// 3. Build Reddit client
    /// 4. Wire the authorization flow
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        let sessions = Arc::new(auth::MemorySessionStore::new(
            Duration::from_secs(config.session.idle_timeout_seconds),
            config.session.max_sessions,
        ));
        tracing::info!(
            idle_timeout_seconds = config.session.idle_timeout_seconds,
            "Session store initialized"
        );

        let reddit = Arc::new(provider::RedditClient::from_config(config.reddit.clone())?);

        let auth_flow = Arc::new(auth::AuthorizationFlow::new(
            auth::AuthorizeParams {
                authorize_url: config.reddit.authorize_url.clone(),
                client_id: config.reddit.client_id.clone(),
                redirect_uri: config.reddit.redirect_uri.clone(),
                scope: config.reddit.scope.clone(),
            },
            sessions.clone(),
            reddit,
            db.clone(),
            Arc::new(auth::SystemClock),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            auth_flow,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
        .merge(api::metrics_router())
}

/// Span for one HTTP request
///
/// Records the path but never the query string, which carries the OAuth
/// `state` and `code` on the callback.
fn request_span(request: &axum::extract::Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

async fn health_check() -> &'static str {
    "OK"
}
