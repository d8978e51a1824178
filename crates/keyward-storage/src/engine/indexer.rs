//! Attribute indexer for the flat-file store
//!
//! An index maps every value of one record attribute to the owning uid. It
//! is built by scanning the whole identities directory once and kept in the
//! injected [`IndexCache`] until it expires or is invalidated.

use super::{is_valid_name, RECORD_SUFFIX};
use keyward_core::types::{scalar_string, value_at_path, AttributeIndex, UserRecord};
use keyward_core::{Error, IndexCache, Result, USER_KIND};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, warn};

pub struct AttributeIndexer {
    identities_dir: PathBuf,
    cache: Arc<dyn IndexCache>,
}

impl AttributeIndexer {
    pub fn new(identities_dir: impl AsRef<Path>, cache: Arc<dyn IndexCache>) -> Self {
        Self {
            identities_dir: identities_dir.as_ref().to_path_buf(),
            cache,
        }
    }

    fn cache_key(attribute: &str) -> String {
        format!("{}.{}", USER_KIND, attribute)
    }

    /// Uid of the user whose `attribute` has `value`.
    ///
    /// A corrupt record file fails the whole lookup.
    pub async fn find_by_attribute(&self, attribute: &str, value: &str) -> Result<Option<String>> {
        let key = Self::cache_key(attribute);

        if let Some(index) = self.cache.get(&key).await {
            return Ok(index.lookup(value).map(|uid| uid.to_string()));
        }

        let index = self.build_index(attribute).await?;
        let uid = index.lookup(value).map(|uid| uid.to_string());
        self.cache.set(&key, index).await;

        Ok(uid)
    }

    /// Drop the cached index of one attribute
    pub async fn invalidate(&self, attribute: &str) {
        self.cache.evict(&Self::cache_key(attribute)).await;
    }

    /// Drop every cached user index
    pub async fn invalidate_all(&self) {
        self.cache.evict_prefix(&format!("{}.", USER_KIND)).await;
    }

    /// Scan every record file and index `attribute`.
    ///
    /// Values are read from the parsed document, not the typed record, so a
    /// list under any key is indexed element by element.
    pub async fn build_index(&self, attribute: &str) -> Result<AttributeIndex> {
        let mut index = AttributeIndex::new(attribute);
        let files = self.record_files().await?;

        for (uid, path) in &files {
            if attribute == "uid" {
                index.insert(uid.as_str(), uid.as_str());
                continue;
            }

            let document = read_document(path).await?;
            let Some(found) = value_at_path(&document, attribute) else {
                continue;
            };

            for value in index_values(found) {
                index.insert(value, uid.as_str());
            }
        }

        debug!(
            "Indexed {} values of {} across {} records",
            index.len(),
            attribute,
            files.len()
        );

        Ok(index)
    }

    /// Record files sorted by name, with symlinks resolved
    pub(crate) async fn record_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut dir = match fs::read_dir(&self.identities_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Identities directory {:?} does not exist", self.identities_dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(uid) = name.strip_suffix(RECORD_SUFFIX) else {
                continue;
            };
            if !is_valid_name(uid) {
                debug!("Skipping record file with invalid name {}", name);
                continue;
            }

            let path = entry.path();
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => files.push((uid.to_string(), path)),
                Ok(_) => debug!("Skipping non-file {:?}", path),
                Err(e) => warn!("Skipping unreadable record {:?}: {}", path, e),
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Error {
    error!("Cannot parse user record {:?}: {}", path, reason);
    Error::record_corrupt(path, reason)
}

/// Load one record file as a YAML document
pub(crate) async fn read_document(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).await?;
    let content = String::from_utf8(bytes).map_err(|e| corrupt(path, e))?;
    let document: Value = serde_yaml::from_str(&content).map_err(|e| corrupt(path, e))?;

    match document {
        Value::Mapping(_) | Value::Null => Ok(document),
        _ => Err(corrupt(path, "record is not a mapping")),
    }
}

/// Load and parse one record file; the uid always comes from the file name
pub(crate) async fn read_record(uid: &str, path: &Path) -> Result<UserRecord> {
    let document = read_document(path).await?;
    UserRecord::from_document(uid, document).map_err(|e| corrupt(path, e))
}

/// Non-blank scalar values of an attribute; sequences are flattened one level
fn index_values(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}
