//! # tally_core
//!
//! Authentication and account-security core for Tally: credential storage,
//! password hashing, session and action tokens, lockout and the security
//! policy that drives it.

pub mod auth;
pub mod config;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
