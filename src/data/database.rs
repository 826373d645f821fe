//! SQLite database operations
//!
//! All database access goes through this module.

use async_trait::async_trait;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::UserTokenInfo;
use crate::error::AppError;
use crate::metrics::DB_QUERIES_TOTAL;

/// Durable store for user token records
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert the record, or replace the one with the same username.
    async fn save(&self, token: &UserTokenInfo) -> Result<(), AppError>;
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // User tokens
    // =========================================================================

    /// Create or replace the token record for `token.username`
    ///
    /// Single statement, so an aborted request leaves either the old row
    /// or the new one, never a mix.
    pub async fn save_user_token(&self, token: &UserTokenInfo) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_tokens (
                username, access_token, token_type, expires_at, refresh_token, scope
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                access_token = excluded.access_token,
                token_type = excluded.token_type,
                expires_at = excluded.expires_at,
                refresh_token = excluded.refresh_token,
                scope = excluded.scope
            "#,
        )
        .bind(&token.username)
        .bind(&token.access_token)
        .bind(&token.token_type)
        .bind(token.expires_at)
        .bind(&token.refresh_token)
        .bind(&token.scope)
        .execute(&self.pool)
        .await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["upsert", "user_tokens"])
            .inc();

        Ok(())
    }

    /// Get the token record for a username
    pub async fn get_user_token(&self, username: &str) -> Result<Option<UserTokenInfo>, AppError> {
        let token =
            sqlx::query_as::<_, UserTokenInfo>("SELECT * FROM user_tokens WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        DB_QUERIES_TOTAL
            .with_label_values(&["select", "user_tokens"])
            .inc();

        Ok(token)
    }

    /// Number of stored token records
    pub async fn count_user_tokens(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_tokens")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl TokenRepository for Database {
    async fn save(&self, token: &UserTokenInfo) -> Result<(), AppError> {
        self.save_user_token(token).await
    }
}
