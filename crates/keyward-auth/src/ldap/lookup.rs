//! Directory lookups
//!
//! A search is only usable when it matches exactly one entry. Zero and
//! multiple matches are both reported as not found.

use crate::ldap::client::{release, DirectoryConnection, DirectoryConnector, Ldap3Connector};
use crate::ldap::types::{DirectoryEntry, LdapConfig, SearchFilter, SearchOutcome, SearchScope};
use crate::ldap::LdapError;
use async_trait::async_trait;
use keyward_core::types::{UserRecord, DIRECTORY_ATTRIBUTE_MAP};
use keyward_core::{Result, Store, USER_KIND};
use std::sync::Arc;
use tracing::{debug, error};

/// Directory attributes requested when building a user record
pub fn mapped_attributes() -> Vec<&'static str> {
    DIRECTORY_ATTRIBUTE_MAP
        .iter()
        .map(|(attr, _)| *attr)
        .filter(|attr| *attr != "dn")
        .collect()
}

/// Run an equality search and classify the result count
pub async fn search(
    conn: &mut dyn DirectoryConnection,
    base_dn: &str,
    scope: SearchScope,
    filter: &SearchFilter,
    attrs: &[&str],
) -> std::result::Result<SearchOutcome, LdapError> {
    let mut entries = conn.search(base_dn, scope, filter, attrs).await?;

    match entries.len() {
        0 => {
            error!("No matches for {}", filter);
            Ok(SearchOutcome::NotFound)
        }
        1 => Ok(entries
            .pop()
            .map(SearchOutcome::Found)
            .unwrap_or(SearchOutcome::NotFound)),
        n => {
            error!("Multiple matches for {} ({} entries)", filter, n);
            Ok(SearchOutcome::Ambiguous(n))
        }
    }
}

/// Read-only user store backed by a live directory
pub struct LdapStore {
    config: Arc<LdapConfig>,
    connector: Arc<dyn DirectoryConnector>,
}

impl LdapStore {
    pub fn new(config: Arc<LdapConfig>) -> Self {
        let connector = Arc::new(Ldap3Connector::new(config.clone()));
        Self { config, connector }
    }

    pub fn with_connector(config: Arc<LdapConfig>, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { config, connector }
    }

    /// Find the single entry matching `filter`.
    ///
    /// Connection and search failures are logged and reported as no match.
    async fn find_entry(&self, filter: &SearchFilter, attrs: &[&str]) -> Option<DirectoryEntry> {
        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("{}", e);
                return None;
            }
        };

        let outcome = search(
            conn.as_mut(),
            &self.config.base_dn,
            self.config.search_scope,
            filter,
            attrs,
        )
        .await;

        release(conn).await;

        match outcome {
            Ok(outcome) => outcome.into_entry(),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Store for LdapStore {
    fn stores(&self) -> &'static [&'static str] {
        &["user:read"]
    }

    async fn find(&self, kind: &str, criteria: &str, value: &str) -> Result<Option<String>> {
        if kind != USER_KIND {
            return Ok(None);
        }

        let filter = if criteria == "uid" {
            SearchFilter::for_identifier(value)
        } else {
            match SearchFilter::for_record_path(criteria, value) {
                Some(filter) => filter,
                None => {
                    debug!("No directory attribute maps to {}", criteria);
                    return Ok(None);
                }
            }
        };

        let entry = match self.find_entry(&filter, &["uid", "mail"]).await {
            Some(entry) => entry,
            None => return Ok(None),
        };

        Ok(entry
            .first("uid")
            .or_else(|| entry.first("mail"))
            .map(|s| s.to_string()))
    }

    async fn exists(&self, kind: &str, id: &str) -> Result<bool> {
        if kind != USER_KIND {
            return Ok(false);
        }

        Ok(self
            .find_entry(&SearchFilter::for_identifier(id), &["dn"])
            .await
            .is_some())
    }

    async fn read(&self, kind: &str, id: &str) -> Result<Option<UserRecord>> {
        if kind != USER_KIND {
            return Ok(None);
        }

        let attrs = mapped_attributes();
        let entry = match self
            .find_entry(&SearchFilter::for_identifier(id), &attrs)
            .await
        {
            Some(entry) => entry,
            None => return Ok(None),
        };

        match UserRecord::from_directory_entry(&entry.dn, &entry.attrs) {
            Ok(mut record) => {
                if record.uid.is_empty() {
                    record.uid = id.to_string();
                }
                Ok(Some(record))
            }
            Err(e) => {
                error!("Error occurred when retrieving search results: {}", e);
                Ok(None)
            }
        }
    }

    async fn write(&self, _kind: &str, id: &str, _record: &UserRecord) -> Result<()> {
        debug!("Ignoring write of {} to read-only directory store", id);
        Ok(())
    }

    async fn delete(&self, _kind: &str, id: &str) -> Result<()> {
        debug!("Ignoring delete of {} from read-only directory store", id);
        Ok(())
    }
}
