// src/utils/cache.rs
use std::time::Duration;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{trace, warn};

use crate::config::CacheConfig;

/// In-memory result cache with size and time-to-live bounds
///
/// Values are stored JSON encoded so one cache can hold search results of any
/// finder. Clones share the same underlying storage.
#[derive(Clone)]
pub struct ResultCache {
    inner: moka::future::Cache<String, Vec<u8>>,
}

impl ResultCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = moka::future::CacheBuilder::new(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_seconds))
    }

    /// Get a decoded value; undecodable entries count as misses
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.inner.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                trace!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.inner.invalidate(key).await;
                None
            }
        }
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.inner.insert(key.to_string(), bytes).await,
            Err(e) => warn!("Failed to encode cache entry {}: {}", key, e),
        }
    }

    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await
    }

    pub async fn insert_bytes(&self, key: &str, bytes: Vec<u8>) {
        self.inner.insert(key.to_string(), bytes).await;
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}
