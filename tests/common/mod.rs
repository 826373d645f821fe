//! Common test utilities for E2E tests

use sneknet::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;
use url::Url;
use wiremock::MockServer;

pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const TEST_CLIENT_SECRET: &str = "test-client-secret";
pub const TEST_REDIRECT_URI: &str = "http://localhost/auth/check";

/// Test server instance
///
/// Reddit endpoints point at `provider`, a wiremock server the test mounts
/// token and identity responses on.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: MockServer,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

pub fn test_config(db_path: std::path::PathBuf, provider_uri: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig { path: db_path },
        reddit: config::RedditConfig {
            client_id: TEST_CLIENT_ID.to_string(),
            client_secret: TEST_CLIENT_SECRET.to_string(),
            redirect_uri: TEST_REDIRECT_URI.to_string(),
            scope: "identity,vote".to_string(),
            authorize_url: Url::parse("https://www.reddit.com/api/v1/authorize").unwrap(),
            token_url: Url::parse(&format!("{provider_uri}/api/v1/access_token")).unwrap(),
            identity_url: Url::parse(&format!("{provider_uri}/api/v1/me")).unwrap(),
            user_agent: "sneknet-tests/0.1".to_string(),
            request_timeout_seconds: 5,
        },
        session: config::SessionConfig {
            secret: "test-secret-key-32-bytes-long!!!".to_string(),
            idle_timeout_seconds: 3600,
            cookie_name: "sneknet_session".to_string(),
            max_sessions: 1000,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let provider = MockServer::start().await;

        let config = test_config(db_path, &provider.uri());
        let state = AppState::new(config).await.unwrap();

        // Redirects are inspected by hand, never followed.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = sneknet::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

/// `name=value` pair of the session cookie set by a response
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .find_map(|value| {
            let raw = value.to_str().ok()?;
            let pair = raw.split(';').next()?;
            pair.starts_with("sneknet_session=")
                .then(|| pair.to_string())
        })
}

/// Value of a query parameter in a redirect `Location`
pub fn location_param(response: &reqwest::Response, name: &str) -> Option<String> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    let url = Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
