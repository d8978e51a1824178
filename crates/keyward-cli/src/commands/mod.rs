//! CLI command implementations

pub mod check;
pub mod find;
pub mod hash;
pub mod show;
pub mod verify;

use anyhow::Context;
use async_trait::async_trait;
use keyward_auth::{
    CredentialVerifier, Credentials, DirectoryVerifier, DispatchingVerifier, Ldap3Connector,
    LdapConfig, LdapStore, LocalPasswordVerifier,
};
use keyward_core::config::StoreBackend;
use keyward_core::{KeywardConfig, MemoryIndexCache, Store};
use keyward_storage::FileStore;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, error};

/// Result of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// Not found, not verified
    Negative,
}

/// Store and verifiers composed from the configuration
pub struct CommandContext {
    pub store: Arc<dyn Store>,
    pub verifier: DispatchingVerifier,
}

impl CommandContext {
    pub fn from_config(config: KeywardConfig) -> anyhow::Result<Self> {
        let ldap = ldap_config(&config)?;

        let store: Arc<dyn Store> = match config.store.backend {
            StoreBackend::File => {
                let cache = Arc::new(MemoryIndexCache::from_ttl_seconds(
                    config.store.index_ttl_seconds,
                ));
                debug!("Using file store at {:?}", config.store.identities_dir);
                Arc::new(FileStore::new(&config.store.identities_dir, cache))
            }
            StoreBackend::Ldap => {
                let ldap = ldap.clone().ok_or_else(|| {
                    keyward_core::Error::Config(
                        "store backend \"ldap\" requires an [ldap] section".to_string(),
                    )
                })?;
                debug!("Using directory store at {}", ldap.server_url);
                Arc::new(LdapStore::new(ldap))
            }
        };

        let directory: Arc<dyn CredentialVerifier> = match &ldap {
            Some(ldap) => Arc::new(DirectoryVerifier::new(
                ldap,
                Arc::new(Ldap3Connector::new(ldap.clone())),
            )),
            None => Arc::new(DirectoryNotConfigured),
        };
        let local = Arc::new(LocalPasswordVerifier::new(store.clone()));

        Ok(Self {
            verifier: DispatchingVerifier::new(store.clone(), directory, local),
            store,
        })
    }
}

/// Validated directory settings, `None` when no host is configured
pub fn ldap_config(config: &KeywardConfig) -> anyhow::Result<Option<Arc<LdapConfig>>> {
    if config.ldap.host.is_none() {
        return Ok(None);
    }

    let ldap = LdapConfig::from_section(&config.ldap)
        .map_err(keyward_core::Error::from)
        .context("invalid [ldap] configuration")?;
    Ok(Some(Arc::new(ldap)))
}

/// Stands in for the directory verifier when no directory is configured
struct DirectoryNotConfigured;

#[async_trait]
impl CredentialVerifier for DirectoryNotConfigured {
    async fn verify(&self, identifier: &str, _credentials: &Credentials) -> bool {
        error!(
            critical = true,
            "User {} requires directory authentication but no [ldap] section is configured",
            identifier
        );
        false
    }
}

/// Read a password from the first line of stdin or from KEYWARD_PASSWORD
pub async fn read_password(from_stdin: bool) -> anyhow::Result<String> {
    if !from_stdin {
        return std::env::var("KEYWARD_PASSWORD")
            .context("set KEYWARD_PASSWORD or pass --password-stdin");
    }

    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;

    // Only the line terminator is stripped; surrounding spaces are part of the password.
    let password = line.strip_suffix('\n').unwrap_or(&line);
    let password = password.strip_suffix('\r').unwrap_or(password);
    Ok(password.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_without_directory() {
        let config = KeywardConfig::default();

        let ctx = CommandContext::from_config(config).unwrap();
        assert_eq!(ctx.store.stores(), &["user:read", "user:write"]);
    }

    #[test]
    fn test_ldap_backend_requires_directory() {
        let mut config = KeywardConfig::default();
        config.store.backend = StoreBackend::Ldap;

        let err = CommandContext::from_config(config).err().unwrap();
        let core = err.downcast_ref::<keyward_core::Error>().unwrap();
        assert!(core.is_fatal());
    }

    #[test]
    fn test_incomplete_directory_section_is_fatal() {
        let config =
            KeywardConfig::from_toml("[ldap]\nhost = \"localhost\"\nport = 389\n").unwrap();

        let err = ldap_config(&config).unwrap_err();
        let core = err.downcast_ref::<keyward_core::Error>().unwrap();
        assert!(matches!(core, keyward_core::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_flagged_user_without_directory_is_rejected() {
        let verifier = DirectoryNotConfigured;
        assert!(!verifier.verify("alice", &Credentials::password("x")).await);
    }
}
