//! LDAP error types
//!
//! Messages may carry directory error text and DNs but never passwords.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LdapError {
    /// Missing or inconsistent directory settings; fatal at startup
    #[error("LDAP configuration error: {0}")]
    Config(String),

    #[error("Could not connect to LDAP server: {0}")]
    Connect(String),

    #[error("STARTTLS negotiation failed: {0}")]
    StartTls(String),

    /// Initial anonymous or service bind failed
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    #[error("Error occurred when searching LDAP server: {0}")]
    Search(String),

    #[error("LDAP operation timed out")]
    Timeout,
}

impl LdapError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an ldap3 error, keeping timeouts distinct
    pub(crate) fn from_ldap3(err: ldap3::LdapError, wrap: fn(String) -> LdapError) -> Self {
        match err {
            ldap3::LdapError::Timeout { .. } => LdapError::Timeout,
            other => wrap(other.to_string()),
        }
    }
}

impl From<LdapError> for keyward_core::Error {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Config(msg) => keyward_core::Error::Config(msg),
            other => keyward_core::Error::Storage(other.to_string()),
        }
    }
}
