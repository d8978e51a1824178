//! Record store trait
//!
//! Defines the generic record store interface. The flat-file and the
//! directory backends implement it for the `user` kind.

use crate::types::UserRecord;
use crate::Result;
use async_trait::async_trait;

/// Record store trait
#[async_trait]
pub trait Store: Send + Sync {
    /// Capabilities this store provides, e.g. `user:read`
    fn stores(&self) -> &'static [&'static str];

    /// Find the id of the record whose `criteria` attribute equals `value`
    async fn find(&self, kind: &str, criteria: &str, value: &str) -> Result<Option<String>>;

    /// Check whether a record exists
    async fn exists(&self, kind: &str, id: &str) -> Result<bool>;

    /// Load a record
    async fn read(&self, kind: &str, id: &str) -> Result<Option<UserRecord>>;

    /// Persist a record
    async fn write(&self, kind: &str, id: &str, record: &UserRecord) -> Result<()>;

    /// Remove a record
    async fn delete(&self, kind: &str, id: &str) -> Result<()>;

    /// Load a user record
    async fn load_user(&self, uid: &str) -> Result<Option<UserRecord>> {
        self.read(crate::USER_KIND, uid).await
    }
}
