//! Reddit login endpoints
//!
//! Thin HTTP wrapper around [`AuthorizationFlow`](super::AuthorizationFlow):
//! cookie handling and redirects only.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::flow::CallbackParams;
use super::session::{SessionId, sign_session_id, verify_session_cookie};
use crate::AppState;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /auth - Redirect to Reddit
/// - GET /auth/check - OAuth callback
/// - GET /auth/success - Confirmation
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(start_authorization))
        .route("/auth/check", get(check_authorization))
        .route("/auth/success", get(authorization_success))
}

/// Session id from the request cookie, if present and correctly signed
fn current_session(jar: &CookieJar, state: &AppState) -> Option<SessionId> {
    let cookie = jar.get(&state.config.session.cookie_name)?;
    verify_session_cookie(cookie.value(), &state.config.session.secret).ok()
}

fn build_session_cookie(state: &AppState, session: &SessionId) -> Result<Cookie<'static>, AppError> {
    let value = sign_session_id(session, &state.config.session.secret)?;

    Ok(
        Cookie::build((state.config.session.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(state.config.should_use_secure_cookies())
            .same_site(SameSite::Lax)
            .build(),
    )
}

/// GET /auth
///
/// Binds a new state to the browser session and redirects to Reddit.
/// A session is created when the browser does not have one yet.
async fn start_authorization(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session = current_session(&jar, &state).unwrap_or_else(SessionId::generate);
    let location = state.auth_flow.start(&session).await?;
    let cookie = build_session_cookie(&state, &session)?;

    Ok((jar.add(cookie), Redirect::to(location.as_str())))
}

/// GET /auth/check
///
/// Reddit redirects here with `state` and `code`, or with `error`.
async fn check_authorization(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Redirect, AppError> {
    let session = current_session(&jar, &state);

    if let Err(error) = state.auth_flow.complete(session.as_ref(), &params).await {
        tracing::warn!(kind = error.kind(), "Authorization callback failed");
        return Err(error.into());
    }

    Ok(Redirect::to("/auth/success"))
}

/// GET /auth/success
async fn authorization_success() -> &'static str {
    "Authorization complete. You can close this window."
}
