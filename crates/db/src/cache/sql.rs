use chrono::Utc;
use sqlx::Row;

use super::{CacheError, CacheStore, CacheTtl};
use crate::DbPool;

/// Cache entries kept in the `cache_entry` table; `expires_at` is a unix timestamp in seconds.
pub struct SqlCacheStore {
    pool: DbPool,
}

impl SqlCacheStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CacheStore for SqlCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value_json, expires_at FROM cache_entry WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: Option<i64> = row.try_get("expires_at")?;
        let now = Utc::now().timestamp();
        if expires_at.map(|deadline| deadline <= now).unwrap_or(false) {
            sqlx::query("DELETE FROM cache_entry WHERE cache_key = ? AND expires_at <= ?")
                .bind(key)
                .bind(now)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }
        Ok(Some(row.try_get("value_json")?))
    }

    async fn set(&self, key: &str, value: String, ttl: CacheTtl) -> Result<(), CacheError> {
        let expires_at = match ttl {
            CacheTtl::Seconds(seconds) => {
                Some(Utc::now().timestamp().saturating_add(i64::try_from(seconds).unwrap_or(i64::MAX)))
            }
            CacheTtl::Never => None,
        };
        sqlx::query(
            "INSERT INTO cache_entry (cache_key, value_json, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(cache_key) DO UPDATE SET
                 value_json = excluded.value_json,
                 expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entry WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entry").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqlCacheStore;
    use crate::cache::{CacheStore, CacheTtl};
    use crate::connect_migrated_in_memory;

    #[tokio::test]
    async fn set_get_overwrite_and_delete() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let store = SqlCacheStore::new(pool);

        store.set("user:name:1", "\"alice\"".to_string(), CacheTtl::Seconds(10)).await.expect("set");
        store.set("user:name:1", "\"bob\"".to_string(), CacheTtl::Seconds(10)).await.expect("overwrite");
        assert_eq!(store.get("user:name:1").await.expect("get").as_deref(), Some("\"bob\""));

        store.delete("user:name:1").await.expect("delete");
        assert_eq!(store.get("user:name:1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_rows_are_absent_and_removed() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let store = SqlCacheStore::new(pool.clone());
        store.set("stale", "1".to_string(), CacheTtl::Seconds(0)).await.expect("set");
        store.set("pinned", "2".to_string(), CacheTtl::Never).await.expect("set");

        assert_eq!(store.get("stale").await.expect("get"), None);
        assert_eq!(store.get("pinned").await.expect("get").as_deref(), Some("2"));

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entry")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn flush_empties_table() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let store = SqlCacheStore::new(pool);
        store.set("a", "1".to_string(), CacheTtl::Never).await.expect("set");

        store.flush().await.expect("flush");

        assert_eq!(store.get("a").await.expect("get"), None);
    }
}
