//! E2E tests for the Reddit login flow

mod common;

use common::{TEST_CLIENT_ID, TEST_REDIRECT_URI, TestServer, location_param, session_cookie};
use reqwest::StatusCode;
use serde_json::json;
use sneknet::auth::session::verify_session_cookie;
use sneknet::auth::{PENDING_STATE_KEY, SessionStore, StateToken};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_reddit(server: &TestServer, access_token: &str, username: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("code=ABC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "ref1",
            "scope": "identity,vote"
        })))
        .mount(&server.provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/me"))
        .and(header("authorization", format!("Bearer {access_token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": username })))
        .mount(&server.provider)
        .await;
}

/// GET /auth and return (session cookie, state)
async fn begin(server: &TestServer, cookie: Option<&str>) -> (String, String) {
    let mut request = server.client.get(server.url("/auth"));
    if let Some(cookie) = cookie {
        request = request.header("Cookie", cookie);
    }
    let response = request.send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response).expect("session cookie");
    let state = location_param(&response, "state").expect("state parameter");
    (cookie, state)
}

async fn callback(server: &TestServer, cookie: Option<&str>, query: &str) -> reqwest::Response {
    let mut request = server.client.get(server.url(&format!("/auth/check?{query}")));
    if let Some(cookie) = cookie {
        request = request.header("Cookie", cookie);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_start_redirects_to_reddit_with_expected_parameters() {
    let server = TestServer::new().await;

    let response = server.client.get(server.url("/auth")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header");
    assert!(location.starts_with("https://www.reddit.com/api/v1/authorize?"));
    assert_eq!(
        location_param(&response, "client_id").as_deref(),
        Some(TEST_CLIENT_ID)
    );
    assert_eq!(
        location_param(&response, "response_type").as_deref(),
        Some("code")
    );
    assert_eq!(
        location_param(&response, "redirect_uri").as_deref(),
        Some(TEST_REDIRECT_URI)
    );
    assert_eq!(
        location_param(&response, "duration").as_deref(),
        Some("permanent")
    );
    assert_eq!(
        location_param(&response, "scope").as_deref(),
        Some("identity,vote")
    );
    assert_eq!(location_param(&response, "state").unwrap().len(), 32);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header");
    assert!(set_cookie.contains("sneknet_session="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_full_flow_stores_user_token() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let before = chrono::Utc::now().timestamp();
    let (cookie, state) = begin(&server, None).await;
    let response = callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;
    let after = chrono::Utc::now().timestamp();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/auth/success"
    );

    let record = server
        .state
        .db
        .get_user_token("alice")
        .await
        .unwrap()
        .expect("token stored");
    assert_eq!(record.access_token, "tok1");
    assert_eq!(record.token_type, "bearer");
    assert_eq!(record.refresh_token.as_deref(), Some("ref1"));
    assert_eq!(record.scope, "identity,vote");
    assert!(record.expires_at >= before + 3600 && record.expires_at <= after + 3600);
    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 1);

    let success = server
        .client
        .get(server.url("/auth/success"))
        .send()
        .await
        .unwrap();
    assert_eq!(success.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pending_state_lives_in_session_until_callback() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let (cookie, state) = begin(&server, None).await;
    let value = cookie.strip_prefix("sneknet_session=").unwrap();
    let session = verify_session_cookie(value, &server.state.config.session.secret).unwrap();

    let stored = server
        .state
        .sessions
        .try_get(&session, PENDING_STATE_KEY)
        .await
        .unwrap()
        .expect("pending state stored");
    assert_eq!(StateToken::from_bytes(&stored), StateToken::parse(&state));

    callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;

    assert_eq!(
        server
            .state
            .sessions
            .try_get(&session, PENDING_STATE_KEY)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_token_exchange_sends_client_credentials() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let (cookie, state) = begin(&server, None).await;
    callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;

    let requests = server.provider.received_requests().await.unwrap();
    let exchange = requests
        .iter()
        .find(|request| request.url.path() == "/api/v1/access_token")
        .expect("token exchange request");
    let body = String::from_utf8_lossy(&exchange.body);
    assert!(body.contains("grant_type=authorization_code"));
    assert!(body.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fauth%2Fcheck"));
    let authorization = exchange
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .expect("basic auth header");
    assert!(authorization.starts_with("Basic "));
}

#[tokio::test]
async fn test_callback_without_session_is_bad_request() {
    let server = TestServer::new().await;

    let response = callback(
        &server,
        None,
        "state=3fae1c2d4b5a69788796a5b4c3d2e1b2&code=ABC123",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.provider.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_callback_with_forged_session_cookie_is_bad_request() {
    let server = TestServer::new().await;
    let (_, state) = begin(&server, None).await;

    let response = callback(
        &server,
        Some("sneknet_session=forged.c2lnbmF0dXJl"),
        &format!("state={state}&code=ABC123"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.provider.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_callback_with_wrong_state_is_generic_bad_request() {
    let server = TestServer::new().await;
    let (cookie, _) = begin(&server, None).await;

    let response = callback(
        &server,
        Some(&cookie),
        "state=00000000000000000000000000000000&code=ABC123",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad request");
    assert!(server.provider.received_requests().await.unwrap().is_empty());
    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn test_provider_error_is_echoed() {
    let server = TestServer::new().await;
    let (cookie, state) = begin(&server, None).await;

    let response = callback(
        &server,
        Some(&cookie),
        &format!("state={state}&error=access_denied"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "access_denied");
}

#[tokio::test]
async fn test_replayed_callback_is_rejected() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let (cookie, state) = begin(&server, None).await;
    let query = format!("state={state}&code=ABC123");

    let first = callback(&server, Some(&cookie), &query).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = callback(&server, Some(&cookie), &query).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 1);
}

#[tokio::test]
async fn test_restart_reuses_session_and_supersedes_old_state() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let (cookie, old_state) = begin(&server, None).await;
    let (second_cookie, new_state) = begin(&server, Some(&cookie)).await;
    assert_eq!(cookie, second_cookie);
    assert_ne!(old_state, new_state);

    let stale = callback(
        &server,
        Some(&cookie),
        &format!("state={old_state}&code=ABC123"),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway_and_stores_nothing() {
    let server = TestServer::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server.provider)
        .await;

    let (cookie, state) = begin(&server, None).await;
    let response = callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 0);
}

#[tokio::test]
async fn test_second_login_updates_existing_record() {
    let server = TestServer::new().await;
    mount_reddit(&server, "tok1", "alice").await;

    let (cookie, state) = begin(&server, None).await;
    callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;

    server.provider.reset().await;
    mount_reddit(&server, "tok2", "alice").await;

    let (cookie, state) = begin(&server, Some(&cookie)).await;
    let response = callback(
        &server,
        Some(&cookie),
        &format!("state={state}&code=ABC123"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    assert_eq!(server.state.db.count_user_tokens().await.unwrap(), 1);
    let record = server
        .state
        .db
        .get_user_token("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.access_token, "tok2");
}
