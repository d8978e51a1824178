//! LDAP directory authentication module
//!
//! Provides:
//! - Connection setup with optional STARTTLS and service bind
//! - Login identifier to search filter resolution
//! - Exactly-one-match directory lookups
//! - A read-only directory-backed user store

mod client;
mod error;
mod lookup;
mod resolver;
mod types;

pub use client::{release, DirectoryConnection, DirectoryConnector, Ldap3Connector};
pub use error::LdapError;
pub use lookup::{mapped_attributes, search, LdapStore};
pub use resolver::{resolve_attribute, SearchAttribute};
pub use types::*;
