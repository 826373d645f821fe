//! Anti-forgery state token
//!
//! A random UUIDv4 (122 bits of entropy). Sent to the provider as 32 hex
//! characters and compared by value when it comes back.

use std::fmt;
use uuid::Uuid;

/// Value bound to a session at flow start and echoed back by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateToken(Uuid);

impl StateToken {
    /// Generate a fresh, unpredictable state value
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a state value returned in a callback
    ///
    /// Accepts the standard UUID text forms (plain hex, hyphenated, braced,
    /// urn). Anything else yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw).ok().map(Self)
    }

    /// Rebuild a token from its session-store encoding
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Encoding written to the session store
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.into_bytes()
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
