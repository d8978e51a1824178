//! Storage engine implementations

mod indexer;

pub use indexer::AttributeIndexer;

use async_trait::async_trait;
use keyward_core::types::UserRecord;
use keyward_core::{Error, IndexCache, Result, Store, USER_KIND};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// File name suffix of a user record, e.g. `alice.user.yml`
pub const RECORD_SUFFIX: &str = ".user.yml";

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_@-][A-Za-z0-9_.@-]{0,254}$").expect("valid record name pattern")
});

/// Whether `name` may be used as a record id.
///
/// Rejects separators, leading dots and anything else that could leave the
/// identities directory.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// User store over a directory of `<uid>.user.yml` files
pub struct FileStore {
    identities_dir: PathBuf,
    indexer: AttributeIndexer,
}

impl FileStore {
    pub fn new(identities_dir: impl AsRef<Path>, cache: Arc<dyn IndexCache>) -> Self {
        let identities_dir = identities_dir.as_ref().to_path_buf();
        Self {
            indexer: AttributeIndexer::new(&identities_dir, cache),
            identities_dir,
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.identities_dir).await?;
        info!("File store initialized at {:?}", self.identities_dir);
        Ok(())
    }

    pub fn indexer(&self) -> &AttributeIndexer {
        &self.indexer
    }

    fn record_path(&self, uid: &str) -> Option<PathBuf> {
        if !is_valid_name(uid) {
            debug!("Rejecting invalid record name {:?}", uid);
            return None;
        }
        Some(self.identities_dir.join(format!("{}{}", uid, RECORD_SUFFIX)))
    }

    async fn is_record_file(path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Store for FileStore {
    fn stores(&self) -> &'static [&'static str] {
        &["user:read", "user:write"]
    }

    async fn find(&self, kind: &str, criteria: &str, value: &str) -> Result<Option<String>> {
        if kind != USER_KIND {
            return Ok(None);
        }
        self.indexer.find_by_attribute(criteria, value).await
    }

    async fn exists(&self, kind: &str, id: &str) -> Result<bool> {
        if kind != USER_KIND {
            return Ok(false);
        }
        match self.record_path(id) {
            Some(path) => Ok(Self::is_record_file(&path).await),
            None => Ok(false),
        }
    }

    async fn read(&self, kind: &str, id: &str) -> Result<Option<UserRecord>> {
        if kind != USER_KIND {
            return Ok(None);
        }
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        if !Self::is_record_file(&path).await {
            return Ok(None);
        }

        indexer::read_record(id, &path).await.map(Some)
    }

    async fn write(&self, kind: &str, id: &str, record: &UserRecord) -> Result<()> {
        if kind != USER_KIND {
            return Err(Error::InvalidArgument(format!("unsupported record kind {}", kind)));
        }
        let path = self
            .record_path(id)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid record name {:?}", id)))?;

        let yaml = serde_yaml::to_string(record)
            .map_err(|e| Error::Internal(format!("Cannot serialize record {}: {}", id, e)))?;

        // Rename into place so a concurrent scan never sees a half-written file.
        let tmp = self.identities_dir.join(format!(".{}{}.tmp", id, RECORD_SUFFIX));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(yaml.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &path).await?;

        self.indexer.invalidate_all().await;
        debug!("Stored user record {}", id);
        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<()> {
        if kind != USER_KIND {
            return Ok(());
        }
        let Some(path) = self.record_path(id) else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => debug!("Deleted user record {}", id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.indexer.invalidate_all().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::MemoryIndexCache;
    use tempfile::tempdir;

    fn store(dir: &Path) -> FileStore {
        FileStore::new(dir, Arc::new(MemoryIndexCache::without_expiry()))
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("alice"));
        assert!(is_valid_name("alice.smith"));
        assert!(is_valid_name("alice@example.org"));
        assert!(is_valid_name("svc_backup-01"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("."));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("../etc/passwd"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
        assert!(!is_valid_name(".hidden"));
        assert!(!is_valid_name("alice\n"));
        assert!(!is_valid_name(&"a".repeat(300)));
    }

    #[tokio::test]
    async fn test_read_sets_uid_from_file_name() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("alice.user.yml"),
            "uid: mallory\nemail: alice@example.org\n",
        )
        .unwrap();
        let store = store(dir.path());

        let record = store.load_user("alice").await.unwrap().unwrap();
        assert_eq!(record.uid, "alice");
        assert_eq!(record.email.as_deref(), Some("alice@example.org"));
        assert!(store.exists(USER_KIND, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_names_are_not_found() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("identities");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("outside.user.yml"), "email: x@example.org\n").unwrap();
        let store = store(&inner);

        assert!(!store.exists(USER_KIND, "../outside").await.unwrap());
        assert!(store.read(USER_KIND, "../outside").await.unwrap().is_none());
        assert!(store.read(USER_KIND, "").await.unwrap().is_none());
        assert!(store.read(USER_KIND, "nobody").await.unwrap().is_none());
        assert!(store.read("client", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_read_is_fatal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bob.user.yml"), "email: [unterminated\n").unwrap();
        let store = store(dir.path());

        let err = store.read(USER_KIND, "bob").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_multi_valued_record_reads_and_indexes() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("bob.user.yml"),
            concat!(
                "email: [b1@example.org, b2@example.org]\n",
                "ldap:\n  dn: uid=bob,dc=example,dc=org\n  auth: true\n  server: ldap2\n",
            ),
        )
        .unwrap();
        let store = store(dir.path());

        let record = store.load_user("bob").await.unwrap().unwrap();
        assert_eq!(record.email.as_deref(), Some("b1@example.org"));
        assert!(record.is_directory_authenticated());
        assert_eq!(
            record.path_get("ldap.server"),
            Some(serde_yaml::Value::String("ldap2".to_string()))
        );
        assert_eq!(
            store.find(USER_KIND, "email", "b2@example.org").await.unwrap(),
            Some("bob".to_string())
        );
    }

    #[tokio::test]
    async fn test_find_goes_through_index() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("alice.user.yml"), "email: alice@example.org\n").unwrap();
        let store = store(dir.path());

        assert_eq!(
            store.find(USER_KIND, "email", "alice@example.org").await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(
            store.find(USER_KIND, "uid", "alice").await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(store.find("client", "email", "alice@example.org").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_and_delete_refresh_index() {
        let dir = tempdir().unwrap();
        let store = store(&dir.path().join("identities"));
        store.init().await.unwrap();

        assert!(store.find(USER_KIND, "email", "erin@example.org").await.unwrap().is_none());

        let mut record = UserRecord::new("erin");
        record.email = Some("erin@example.org".to_string());
        store.write(USER_KIND, "erin", &record).await.unwrap();

        assert_eq!(
            store.find(USER_KIND, "email", "erin@example.org").await.unwrap(),
            Some("erin".to_string())
        );
        assert_eq!(store.load_user("erin").await.unwrap(), Some(record));

        store.delete(USER_KIND, "erin").await.unwrap();
        assert!(store.find(USER_KIND, "email", "erin@example.org").await.unwrap().is_none());
        store.delete(USER_KIND, "erin").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_name() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let err = store
            .write(USER_KIND, "../escape", &UserRecord::new("escape"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
