//! # Latchkey Shared Library
//!
//! The authentication and session core used by the Latchkey API server:
//! access tokens, refresh token rotation, and the login, registration and
//! logout flows that produce and consume them.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, access token codec, refresh token secrets
//! - `db`: Connection pool and embedded migrations
//! - `models`: Database models and their queries
//! - `store`: Storage trait with Postgres and in-memory backends
//! - `service`: Authentication and registration orchestrators

pub mod auth;
pub mod db;
pub mod models;
pub mod service;
pub mod store;

/// Current version of the Latchkey shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
