//! Server-side session storage
//!
//! The browser only holds an HMAC-signed session id cookie. Values live
//! in a [`SessionStore`]; the default one is an in-memory Moka cache whose
//! idle timeout drops sessions that have not been touched for a while.
//!
//! Updates of one session are applied one at a time through Moka's entry
//! compute API. Concurrent writes to the same key are last-write-wins.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use moka::future::Cache;
use moka::ops::compute::Op;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Opaque identifier of one browser session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random session id (256 bits, URL-safe base64)
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Create the cookie value for a session id
///
/// Format: `{id}.{base64(hmac_sha256(id))}`
pub fn sign_session_id(id: &SessionId, secret: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(id.as_str().as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", id.as_str(), signature_b64))
}

/// Verify a session cookie value and return the id it carries
///
/// # Errors
/// Returns `Unauthorized` if the value is malformed or the signature does
/// not match
pub fn verify_session_cookie(value: &str, secret: &str) -> Result<SessionId, AppError> {
    let (id, signature_b64) = value.split_once('.').ok_or(AppError::Unauthorized)?;
    if id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(id.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    Ok(SessionId(id.to_string()))
}

/// Per-session key/value storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, session: &SessionId, key: &str, value: Vec<u8>) -> Result<(), AppError>;

    /// Read the value under `key`, if the session and key exist.
    async fn try_get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Read and delete the value under `key` in one step.
    ///
    /// Of two concurrent calls for the same session and key, at most one
    /// gets the value.
    async fn take(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>, AppError>;
}

type SessionEntries = Arc<HashMap<String, Vec<u8>>>;

/// In-process session store
///
/// Every read or write counts as activity for the idle timeout.
pub struct MemorySessionStore {
    sessions: Cache<SessionId, SessionEntries>,
}

impl MemorySessionStore {
    /// # Arguments
    /// * `idle_timeout` - Sessions unused for this long are evicted
    /// * `max_sessions` - Capacity before least-recently-used eviction
    pub fn new(idle_timeout: Duration, max_sessions: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_idle(idle_timeout)
            .build();

        Self { sessions }
    }

    fn record_size(&self) {
        crate::metrics::SESSIONS_ACTIVE.set(self.sessions.entry_count() as i64);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set(&self, session: &SessionId, key: &str, value: Vec<u8>) -> Result<(), AppError> {
        self.sessions
            .entry(session.clone())
            .and_compute_with(|existing| {
                let mut entries = existing
                    .map(|entry| entry.into_value().as_ref().clone())
                    .unwrap_or_default();
                entries.insert(key.to_string(), value);
                std::future::ready(Op::Put(Arc::new(entries)))
            })
            .await;
        self.record_size();

        Ok(())
    }

    async fn try_get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self
            .sessions
            .get(session)
            .await
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn take(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let mut taken = None;
        self.sessions
            .entry(session.clone())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let mut entries = entry.into_value().as_ref().clone();
                        taken = entries.remove(key);
                        if taken.is_some() {
                            Op::Put(Arc::new(entries))
                        } else {
                            Op::Nop
                        }
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(taken)
    }
}
