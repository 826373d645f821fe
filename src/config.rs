//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};
use url::Url;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reddit: RedditConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "snek.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://snek.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Reddit OAuth application configuration
///
/// `client_secret` is only read by the provider client; the flow
/// controller never sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the Reddit application
    pub redirect_uri: String,
    /// Requested scopes, comma separated (default: "identity,vote")
    pub scope: String,
    /// Authorization page the browser is sent to
    pub authorize_url: Url,
    /// Code-for-token exchange endpoint
    pub token_url: Url,
    /// Identity endpoint queried with the bearer token
    pub identity_url: Url,
    /// Reddit rejects requests without a descriptive User-Agent
    pub user_agent: String,
    /// Per-request timeout for provider calls
    pub request_timeout_seconds: u64,
}

/// Server-side session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key for the session cookie (32+ bytes)
    pub secret: String,
    /// Sessions idle for longer than this are dropped (default: 86400 = 1 day)
    pub idle_timeout_seconds: u64,
    /// Name of the cookie carrying the session id
    pub cookie_name: String,
    /// Upper bound on live sessions held in memory
    pub max_sessions: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        let level = self.level.to_ascii_lowercase();
        format!("sneknet={level},tower_http={level}")
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SNEKNET__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/sneknet.db")?
            .set_default("reddit.scope", "identity,vote")?
            .set_default(
                "reddit.authorize_url",
                "https://www.reddit.com/api/v1/authorize",
            )?
            .set_default(
                "reddit.token_url",
                "https://www.reddit.com/api/v1/access_token",
            )?
            .set_default("reddit.identity_url", "https://oauth.reddit.com/api/v1/me")?
            .set_default(
                "reddit.user_agent",
                concat!("sneknet/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("reddit.request_timeout_seconds", 10)?
            .set_default("session.idle_timeout_seconds", 86400)?
            .set_default("session.cookie_name", "sneknet_session")?
            .set_default("session.max_sessions", 100_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SNEKNET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.idle_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "session.idle_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.reddit.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "reddit.client_id must not be empty".to_string(),
            ));
        }

        if Url::parse(&self.reddit.redirect_uri).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "reddit.redirect_uri must be an absolute URL: {}",
                self.reddit.redirect_uri
            )));
        }

        if !LoggingConfig::LEVELS
            .iter()
            .any(|level| self.logging.level.eq_ignore_ascii_case(level))
        {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of {}: {}",
                LoggingConfig::LEVELS.join(", "),
                self.logging.level
            )));
        }

        if !self.logging.is_json() && !self.logging.format.eq_ignore_ascii_case("pretty") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\": {}",
                self.logging.format
            )));
        }

        if self.should_use_secure_cookies()
            && !self.server.protocol.eq_ignore_ascii_case("https")
        {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
