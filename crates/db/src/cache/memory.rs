use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{CacheError, CacheStore, CacheTtl};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|deadline| deadline <= now).unwrap_or(false)
    }
}

/// Process-local store; expiry is checked on read.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCacheStore {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).map(|entry| entry.is_expired(now)).unwrap_or(false) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: CacheTtl) -> Result<(), CacheError> {
        let expires_at = match ttl {
            CacheTtl::Seconds(seconds) => Some(Instant::now() + Duration::from_secs(seconds)),
            CacheTtl::Never => None,
        };
        self.entries.write().await.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
