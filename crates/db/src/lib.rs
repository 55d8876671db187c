pub mod cache;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use cache::{CacheAside, CacheError, CacheStore, CacheTtl, InMemoryCacheStore, SqlCacheStore};
pub use connection::{connect, connect_migrated_in_memory, connect_with_settings, DbPool};
pub use repositories::RepositoryError;
