//! check-config command - validate configuration and optionally the directory

use super::{ldap_config, CommandOutcome};
use anyhow::Result;
use keyward_auth::ldap::release;
use keyward_auth::{DirectoryConnector, Ldap3Connector};
use keyward_core::config::StoreBackend;
use keyward_core::KeywardConfig;
use tracing::{error, warn};

pub async fn execute(config: &KeywardConfig, connect: bool) -> Result<CommandOutcome> {
    let ldap = ldap_config(config)?;

    match config.store.backend {
        StoreBackend::File => {
            println!("store: file ({:?})", config.store.identities_dir);
            if !config.store.identities_dir.is_dir() {
                warn!(
                    "Identities directory {:?} does not exist",
                    config.store.identities_dir
                );
            }
        }
        StoreBackend::Ldap => {
            if ldap.is_none() {
                return Err(keyward_core::Error::Config(
                    "store backend \"ldap\" requires an [ldap] section".to_string(),
                )
                .into());
            }
            println!("store: ldap");
        }
    }

    let Some(ldap) = ldap else {
        println!("directory: not configured");
        return Ok(CommandOutcome::Success);
    };

    println!(
        "directory: {} (base {}, scope {:?}, starttls {})",
        ldap.server_url, ldap.base_dn, ldap.search_scope, ldap.start_tls
    );

    if !connect {
        return Ok(CommandOutcome::Success);
    }

    match Ldap3Connector::new(ldap).connect().await {
        Ok(conn) => {
            release(conn).await;
            println!("directory: connection ok");
            Ok(CommandOutcome::Success)
        }
        Err(e) => {
            error!("{}", e);
            println!("directory: connection failed");
            Ok(CommandOutcome::Negative)
        }
    }
}
