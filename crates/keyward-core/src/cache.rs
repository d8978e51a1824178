//! Attribute index cache
//!
//! The cache is owned by the surrounding service and handed to indexers
//! explicitly. Entries live until their TTL elapses or they are evicted.

use crate::types::AttributeIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Storage for attribute indexes keyed by name
#[async_trait]
pub trait IndexCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<AttributeIndex>;

    async fn set(&self, key: &str, index: AttributeIndex);

    async fn evict(&self, key: &str);

    /// Evict every key starting with `prefix`
    async fn evict_prefix(&self, prefix: &str);
}

/// In-process index cache
pub struct MemoryIndexCache {
    entries: RwLock<HashMap<String, CachedIndex>>,
    ttl: Option<Duration>,
}

struct CachedIndex {
    index: AttributeIndex,
    cached_at: Instant,
}

impl MemoryIndexCache {
    /// Create a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Create a cache whose entries only leave through eviction
    pub fn without_expiry() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// `0` disables expiry
    pub fn from_ttl_seconds(seconds: u64) -> Self {
        if seconds == 0 {
            Self::without_expiry()
        } else {
            Self::new(Duration::from_secs(seconds))
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IndexCache for MemoryIndexCache {
    async fn get(&self, key: &str) -> Option<AttributeIndex> {
        let entries = self.entries.read().await;
        let cached = entries.get(key)?;

        if let Some(ttl) = self.ttl {
            if cached.cached_at.elapsed() >= ttl {
                debug!("Cached index {} expired", key);
                return None;
            }
        }

        Some(cached.index.clone())
    }

    async fn set(&self, key: &str, index: AttributeIndex) {
        self.entries.write().await.insert(
            key.to_string(),
            CachedIndex {
                index,
                cached_at: Instant::now(),
            },
        );
    }

    async fn evict(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn evict_prefix(&self, prefix: &str) {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }
}
