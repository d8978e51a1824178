//! Credential verification
//!
//! [`DispatchingVerifier`] loads the candidate record and routes it either
//! to [`DirectoryVerifier`] (records carrying the directory-auth flag) or
//! to the local password check. Every negative outcome surfaces as the same
//! `false`; only the log severity tells them apart.

use crate::ldap::{
    release, search, BindStatus, DirectoryConnection, DirectoryConnector, LdapConfig, SearchFilter,
    SearchOutcome, SearchScope,
};
use async_trait::async_trait;
use keyward_core::{Store, SECRET_USER_PATHS};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

/// Credentials supplied with a login attempt
#[derive(Clone)]
pub struct Credentials {
    password: String,
}

impl Credentials {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Capability to check a login identifier and credentials
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, identifier: &str, credentials: &Credentials) -> bool;
}

/// Why a directory verification ended the way it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The directory accepted a bind as the resolved entry
    Verified,
    /// Empty password; never sent to the directory
    EmptyPassword,
    /// Connect, STARTTLS, initial bind or search failed
    DirectoryUnavailable(String),
    /// Search matched no entry
    NoMatch,
    /// Search matched more than one entry
    Ambiguous(usize),
    /// The bind as the resolved entry was refused
    BindRejected { code: u32 },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified)
    }

    /// Severity this outcome is logged at
    pub fn level(&self) -> Level {
        match self {
            VerificationOutcome::Verified => Level::INFO,
            VerificationOutcome::EmptyPassword | VerificationOutcome::BindRejected { .. } => {
                Level::WARN
            }
            VerificationOutcome::DirectoryUnavailable(_)
            | VerificationOutcome::NoMatch
            | VerificationOutcome::Ambiguous(_) => Level::ERROR,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "directory bind succeeded"),
            VerificationOutcome::EmptyPassword => write!(f, "empty password refused"),
            VerificationOutcome::DirectoryUnavailable(e) => write!(f, "{}", e),
            VerificationOutcome::NoMatch => write!(f, "no matching directory entry"),
            VerificationOutcome::Ambiguous(n) => write!(f, "{} matching directory entries", n),
            VerificationOutcome::BindRejected { code } => {
                write!(f, "cannot bind using user name and password (code {})", code)
            }
        }
    }
}

// ============================================================================
// Directory verification
// ============================================================================

/// Verifies a password by re-binding as the user's directory entry
pub struct DirectoryVerifier {
    connector: Arc<dyn DirectoryConnector>,
    base_dn: String,
    scope: SearchScope,
}

impl DirectoryVerifier {
    pub fn new(config: &LdapConfig, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            connector,
            base_dn: config.base_dn.clone(),
            scope: config.search_scope,
        }
    }

    /// Verify and report why the attempt succeeded or failed
    pub async fn verify_detailed(
        &self,
        identifier: &str,
        credentials: &Credentials,
    ) -> VerificationOutcome {
        let outcome = self.run(identifier, credentials).await;

        let level = outcome.level();
        if level == Level::ERROR {
            error!("LDAP verification of {} failed: {}", identifier, outcome);
        } else if level == Level::WARN {
            warn!("LDAP verification of {} failed: {}", identifier, outcome);
        } else {
            info!("LDAP verification of {} succeeded", identifier);
        }

        outcome
    }

    async fn run(&self, identifier: &str, credentials: &Credentials) -> VerificationOutcome {
        if credentials.secret().is_empty() {
            return VerificationOutcome::EmptyPassword;
        }

        let filter = SearchFilter::for_identifier(identifier);

        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => return VerificationOutcome::DirectoryUnavailable(e.to_string()),
        };

        let outcome = self.bind_as_entry(conn.as_mut(), &filter, credentials).await;
        release(conn).await;
        outcome
    }

    async fn bind_as_entry(
        &self,
        conn: &mut dyn DirectoryConnection,
        filter: &SearchFilter,
        credentials: &Credentials,
    ) -> VerificationOutcome {
        let entry = match search(conn, &self.base_dn, self.scope, filter, &["dn"]).await {
            Ok(SearchOutcome::Found(entry)) => entry,
            Ok(SearchOutcome::NotFound) => return VerificationOutcome::NoMatch,
            Ok(SearchOutcome::Ambiguous(n)) => return VerificationOutcome::Ambiguous(n),
            Err(e) => return VerificationOutcome::DirectoryUnavailable(e.to_string()),
        };

        debug!("Binding as {}", entry.dn);

        match conn.bind(&entry.dn, credentials.secret()).await {
            Ok(BindStatus::Accepted) => VerificationOutcome::Verified,
            Ok(BindStatus::Rejected { code, .. }) => VerificationOutcome::BindRejected { code },
            Err(e) => VerificationOutcome::DirectoryUnavailable(e.to_string()),
        }
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryVerifier {
    async fn verify(&self, identifier: &str, credentials: &Credentials) -> bool {
        self.verify_detailed(identifier, credentials)
            .await
            .is_verified()
    }
}

// ============================================================================
// Local verification
// ============================================================================

/// Verifies a password against the hash stored in the user record
pub struct LocalPasswordVerifier {
    store: Arc<dyn Store>,
}

impl LocalPasswordVerifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialVerifier for LocalPasswordVerifier {
    async fn verify(&self, identifier: &str, credentials: &Credentials) -> bool {
        let record = match self.store.load_user(identifier).await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                error!("Could not load user {}: {}", identifier, e);
                return false;
            }
        };

        let Some(hash) = record.password_hash() else {
            warn!("User {} has no local password", identifier);
            return false;
        };

        match keyward_crypto::verify_password(credentials.secret(), hash) {
            Ok(true) => true,
            Ok(false) => {
                warn!("Incorrect password for {}", identifier);
                false
            }
            Err(e) => {
                error!("Cannot check password of {}: {}", identifier, e);
                false
            }
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Routes each attempt by the record's directory-auth flag
pub struct DispatchingVerifier {
    store: Arc<dyn Store>,
    directory: Arc<dyn CredentialVerifier>,
    local: Arc<dyn CredentialVerifier>,
}

impl DispatchingVerifier {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn CredentialVerifier>,
        local: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            store,
            directory,
            local,
        }
    }

    /// User record paths that must be hidden from untrusted callers
    pub fn secret_user_data_paths(&self) -> &'static [&'static str] {
        SECRET_USER_PATHS
    }
}

#[async_trait]
impl CredentialVerifier for DispatchingVerifier {
    async fn verify(&self, identifier: &str, credentials: &Credentials) -> bool {
        let record = match self.store.load_user(identifier).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Unknown user {}", identifier);
                return false;
            }
            Err(e) => {
                error!("Could not load user {}: {}", identifier, e);
                return false;
            }
        };

        if record.is_directory_authenticated() {
            self.directory.verify(identifier, credentials).await
        } else {
            self.local.verify(identifier, credentials).await
        }
    }
}
