//! Reddit OAuth authentication
//!
//! Handles:
//! - Reddit authorization code flow
//! - Server-side session management
//! - Login endpoints

mod flow;
mod routes;
pub mod session;
pub mod state;

pub use flow::{
    AuthorizationFlow, AuthorizeParams, CallbackParams, Clock, PENDING_STATE_KEY, SystemClock,
};
pub use routes::auth_router;
pub use session::{MemorySessionStore, SessionId, SessionStore};
pub use state::StateToken;
