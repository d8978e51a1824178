//! LDAP connection handling
//!
//! Opens a connection, optionally upgrades it with STARTTLS, and performs
//! the initial anonymous or service bind. Connections are request scoped
//! and must be handed to [`release`] once the caller is done with them.

use crate::ldap::error::LdapError;
use crate::ldap::types::{
    BindStatus, DirectoryEntry, LdapConfig, SearchFilter, SearchScope, ServiceBind,
};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Opens bound directory connections
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Connect and perform the initial bind
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, LdapError>;
}

/// A bound connection used by exactly one request
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Equality search below `base_dn`; referrals are dropped, never followed
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &SearchFilter,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LdapError>;

    /// Re-bind the connection as `dn`
    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindStatus, LdapError>;

    async fn unbind(&mut self) -> Result<(), LdapError>;
}

/// Unbind a connection, logging rather than propagating a failure
pub async fn release(mut conn: Box<dyn DirectoryConnection>) {
    if let Err(e) = conn.unbind().await {
        debug!("LDAP unbind failed: {}", e);
    }
}

/// Perform the initial anonymous or service bind on a fresh connection.
///
/// The connection is unbound before any error is returned.
pub(crate) async fn initial_bind(
    conn: &mut dyn DirectoryConnection,
    service: Option<&ServiceBind>,
) -> Result<(), LdapError> {
    let (bind_dn, bind_password, kind) = match service {
        Some(service) => (service.bind_dn.as_str(), service.bind_password.as_str(), "service"),
        None => ("", "", "anonymous"),
    };

    let err = match conn.bind(bind_dn, bind_password).await {
        Ok(BindStatus::Accepted) => return Ok(()),
        Ok(BindStatus::Rejected { code, message }) => LdapError::Bind(format!(
            "{} bind rejected with code {}: {}",
            kind, code, message
        )),
        Err(LdapError::Timeout) => LdapError::Timeout,
        Err(other) => LdapError::Bind(other.to_string()),
    };

    if let Err(e) = conn.unbind().await {
        debug!("LDAP unbind after failed {} bind failed: {}", kind, e);
    }
    Err(err)
}

/// Classify a failure to open a connection.
///
/// Only failures after the TCP connection is up count as STARTTLS failures:
/// a refused extended operation or a broken TLS handshake.
pub(crate) fn connect_error(err: ldap3::LdapError, start_tls: bool) -> LdapError {
    let after_tcp = match &err {
        ldap3::LdapError::Io { source } => source.kind() == io::ErrorKind::InvalidData,
        ldap3::LdapError::LdapResult { .. } => true,
        _ => false,
    };

    if start_tls && after_tcp {
        LdapError::from_ldap3(err, LdapError::StartTls)
    } else {
        LdapError::from_ldap3(err, LdapError::Connect)
    }
}

/// Drop referral results, logging each one
fn without_referrals<T>(results: Vec<T>, is_ref: impl Fn(&T) -> bool, filter: &str) -> Vec<T> {
    results
        .into_iter()
        .filter(|result| {
            if is_ref(result) {
                debug!("Ignoring referral returned for {}", filter);
                false
            } else {
                true
            }
        })
        .collect()
}

/// Connector backed by ldap3
pub struct Ldap3Connector {
    config: Arc<LdapConfig>,
}

impl Ldap3Connector {
    pub fn new(config: Arc<LdapConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    fn settings(&self) -> LdapConnSettings {
        // ldap3 only speaks LDAPv3 and reports referrals instead of chasing them.
        LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout)
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.skip_tls_verify)
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, LdapError> {
        debug!("Connecting to LDAP server: {}", self.config.server_url);

        let start_tls = self.config.start_tls;
        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(), &self.config.server_url)
            .await
            .map_err(|e| connect_error(e, start_tls))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection driver error: {}", e);
            }
        });

        let mut connection = Ldap3Connection {
            ldap,
            timeout: self.config.timeout,
            released: false,
        };

        initial_bind(&mut connection, self.config.service_bind.as_ref()).await?;

        Ok(Box::new(connection))
    }
}

/// ldap3 connection handle
struct Ldap3Connection {
    ldap: Ldap,
    timeout: Duration,
    released: bool,
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &SearchFilter,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LdapError> {
        let filter = filter.to_ldap_string();
        debug!("Searching {} for {}", base_dn, filter);

        let (results, _res) = self
            .ldap
            .with_timeout(self.timeout)
            .search(base_dn, scope.into(), &filter, attrs.to_vec())
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Search))?
            .success()
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Search))?;

        let entries = without_referrals(results, |result| result.is_ref(), &filter)
            .into_iter()
            .map(|result| DirectoryEntry::from(SearchEntry::construct(result)))
            .collect();

        Ok(entries)
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindStatus, LdapError> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Connect))?;

        if result.rc == 0 {
            Ok(BindStatus::Accepted)
        } else {
            Ok(BindStatus::Rejected {
                code: result.rc,
                message: result.text,
            })
        }
    }

    async fn unbind(&mut self) -> Result<(), LdapError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        self.ldap
            .unbind()
            .await
            .map_err(|e| LdapError::from_ldap3(e, LdapError::Connect))
    }
}

impl Drop for Ldap3Connection {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Reached only when a request future is dropped before release.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let mut ldap = self.ldap.clone();
            handle.spawn(async move {
                if let Err(e) = ldap.unbind().await {
                    debug!("Deferred LDAP unbind failed: {}", e);
                }
            });
        }
    }
}
