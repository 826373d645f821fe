//! Data layer module
//!
//! Handles token persistence:
//! - SQLite database operations
//! - `TokenRepository` seam used by the authorization flow

mod database;
mod models;

pub use database::{Database, TokenRepository};
pub use models::*;
