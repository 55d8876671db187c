//! Read-through, write-invalidate caching of derived values.
//!
//! Values are stored as JSON text in a [`CacheStore`]. [`CacheAside`] is the typed facade the
//! services use; it never lets a store failure escape, a broken cache only costs a reload.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub mod memory;
pub mod sql;

pub use memory::InMemoryCacheStore;
pub use sql::SqlCacheStore;

/// Lifetime of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTtl {
    /// Expires this many seconds after it was written; `Seconds(0)` is stale on the next read.
    Seconds(u64),
    Never,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("cache value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: CacheTtl) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn flush(&self) -> Result<(), CacheError>;
}

pub mod keys {
    use voicedesk_core::domain::agent::AgentId;
    use voicedesk_core::domain::timbre::TimbreId;
    use voicedesk_core::domain::user::UserId;

    use super::CacheTtl;

    pub const SYS_VERSION: &str = "sys:version";

    pub const DEVICE_COUNT_TTL: CacheTtl = CacheTtl::Seconds(60);
    pub const TIMBRE_TTL: CacheTtl = CacheTtl::Never;
    pub const USER_NAME_TTL: CacheTtl = CacheTtl::Seconds(10);

    pub fn agent_device_count(id: &AgentId) -> String {
        format!("agent:device_count:{}", id.0)
    }

    pub fn timbre_name(id: &TimbreId) -> String {
        format!("timbre:name:{}", id.0)
    }

    pub fn timbre_details(id: &TimbreId) -> String {
        format!("timbre:details:{}", id.0)
    }

    pub fn user_name(id: UserId) -> String {
        format!("user:name:{}", id.0)
    }
}

/// Outcome of comparing the stored cache version with the running one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionCheck {
    Current,
    Refreshed { previous: Option<String> },
}

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(event_name = "cache.read_failed", cache_key = key, error = %error, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(event_name = "cache.decode_failed", cache_key = key, error = %error, "cached value could not be decoded; treating as miss");
                None
            }
        }
    }

    pub async fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V, ttl: CacheTtl) {
        let result = match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, raw, ttl).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = result {
            warn!(event_name = "cache.write_failed", cache_key = key, error = %error, "cache write failed");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(error) = self.store.delete(key).await {
            warn!(event_name = "cache.invalidate_failed", cache_key = key, error = %error, "cache invalidation failed");
        }
    }

    /// Returns the cached value, or runs `loader` and caches what it finds.
    ///
    /// A loader result of `None` is passed through without being cached.
    pub async fn get_or_load<V, E, F, Fut>(
        &self,
        key: &str,
        ttl: CacheTtl,
        loader: F,
    ) -> Result<Option<V>, E>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        if let Some(hit) = self.get::<V>(key).await {
            return Ok(Some(hit));
        }
        let loaded = loader().await?;
        if let Some(value) = &loaded {
            self.set(key, value, ttl).await;
        }
        Ok(loaded)
    }

    /// Flushes the whole store when it was written by a different version of the service.
    pub async fn ensure_version(&self, version: &str) -> Result<VersionCheck, CacheError> {
        let previous = match self.store.get(keys::SYS_VERSION).await {
            Ok(raw) => raw.and_then(|raw| serde_json::from_str::<String>(&raw).ok()),
            Err(error) => {
                warn!(event_name = "cache.version_read_failed", error = %error, "could not read cache version; flushing");
                None
            }
        };
        if previous.as_deref() == Some(version) {
            return Ok(VersionCheck::Current);
        }

        self.store.flush().await?;
        self.store.set(keys::SYS_VERSION, serde_json::to_string(version)?, CacheTtl::Never).await?;
        info!(
            event_name = "cache.version_refreshed",
            previous = previous.as_deref().unwrap_or("none"),
            current = version,
            "cache flushed for new version"
        );
        Ok(VersionCheck::Refreshed { previous })
    }
}
