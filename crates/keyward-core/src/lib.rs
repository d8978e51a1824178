//! Keyward Core Library
//!
//! Core types, traits, and configuration shared by the keyward identity
//! store crates.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use cache::{IndexCache, MemoryIndexCache};
pub use config::KeywardConfig;
pub use error::{Error, Result};
pub use store::Store;

/// Keyward version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Store kind for user records
pub const USER_KIND: &str = "user";

/// Record path of the directory-authentication flag
pub const DIRECTORY_AUTH_PATH: &str = "ldap.auth";

/// User record paths that must never be exposed to or set by untrusted callers
pub const SECRET_USER_PATHS: &[&str] = &[DIRECTORY_AUTH_PATH];
