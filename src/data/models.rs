//! Data models
//!
//! Rust structs representing database entities.

use serde::{Deserialize, Serialize};

/// Stored Reddit grant for one user
///
/// `username` is the natural key: a later login by the same user
/// replaces the previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserTokenInfo {
    /// Reddit username reported by the identity endpoint
    pub username: String,
    pub access_token: String,
    pub token_type: String,
    /// Absolute expiry (unix seconds), computed when the grant was received
    pub expires_at: i64,
    pub refresh_token: Option<String>,
    pub scope: String,
}
