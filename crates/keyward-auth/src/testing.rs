//! In-memory directory used by the unit tests

use crate::ldap::{
    BindStatus, DirectoryConnection, DirectoryConnector, DirectoryEntry, LdapError, SearchFilter,
    SearchScope,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeDirectory {
    entries: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    connect_error: Option<LdapError>,
    search_error: Option<LdapError>,
    bind_error: Option<LdapError>,
    pub connects: AtomicUsize,
    pub unbinds: AtomicUsize,
    pub user_binds: AtomicUsize,
    pub last_filter: Mutex<Option<SearchFilter>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, entry: DirectoryEntry, password: &str) -> Self {
        self.passwords.insert(entry.dn.clone(), password.to_string());
        self.entries.push(entry);
        self
    }

    /// Accept binds as `dn`, e.g. `("", "")` for anonymous binds
    pub fn with_bind_password(mut self, dn: &str, password: &str) -> Self {
        self.passwords.insert(dn.to_string(), password.to_string());
        self
    }

    pub fn failing_bind(mut self, err: LdapError) -> Self {
        self.bind_error = Some(err);
        self
    }

    pub fn failing_connect(mut self, err: LdapError) -> Self {
        self.connect_error = Some(err);
        self
    }

    pub fn failing_search(mut self, err: LdapError) -> Self {
        self.search_error = Some(err);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn unbinds(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }

    pub fn user_binds(&self) -> usize {
        self.user_binds.load(Ordering::SeqCst)
    }
}

/// Connector handing out connections to a shared fake directory
pub struct FakeConnector(pub Arc<FakeDirectory>);

#[async_trait]
impl DirectoryConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, LdapError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.0.connect_error {
            return Err(err.clone());
        }
        Ok(Box::new(FakeConnection(self.0.clone())))
    }
}

struct FakeConnection(Arc<FakeDirectory>);

#[async_trait]
impl DirectoryConnection for FakeConnection {
    async fn search(
        &mut self,
        _base_dn: &str,
        _scope: SearchScope,
        filter: &SearchFilter,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LdapError> {
        *self.0.last_filter.lock().unwrap() = Some(filter.clone());
        if let Some(err) = &self.0.search_error {
            return Err(err.clone());
        }

        Ok(self
            .0
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .attrs
                    .get(filter.attribute())
                    .map(|values| values.iter().any(|v| v == filter.value()))
                    .unwrap_or(false)
            })
            .map(|entry| DirectoryEntry {
                dn: entry.dn.clone(),
                attrs: entry
                    .attrs
                    .iter()
                    .filter(|(name, _)| attrs.contains(&name.as_str()))
                    .map(|(name, values)| (name.clone(), values.clone()))
                    .collect(),
            })
            .collect())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<BindStatus, LdapError> {
        self.0.user_binds.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.0.bind_error {
            return Err(err.clone());
        }
        match self.0.passwords.get(dn) {
            Some(expected) if expected == password => Ok(BindStatus::Accepted),
            _ => Ok(BindStatus::Rejected {
                code: 49,
                message: "Invalid credentials".to_string(),
            }),
        }
    }

    async fn unbind(&mut self) -> Result<(), LdapError> {
        self.0.unbinds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn alice() -> DirectoryEntry {
    DirectoryEntry::new("uid=alice,ou=people,dc=example,dc=org")
        .with_attr("uid", "alice")
        .with_attr("cn", "Alice Liddell")
        .with_attr("mail", "alice@example.org")
}

pub fn bob() -> DirectoryEntry {
    DirectoryEntry::new("uid=bob,ou=people,dc=example,dc=org")
        .with_attr("uid", "bob")
        .with_attr("mail", "shared@example.org")
}

pub fn robert() -> DirectoryEntry {
    DirectoryEntry::new("uid=robert,ou=people,dc=example,dc=org")
        .with_attr("uid", "robert")
        .with_attr("mail", "shared@example.org")
}
