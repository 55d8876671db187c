use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use voicedesk_agent::{initialize_default_agent, DefaultAgentReconciler, ReconcileOutcome, Repositories};
use voicedesk_core::config::{AppConfig, CacheBackend, ConfigError, LoadOptions};
use voicedesk_core::modules::ModuleDocument;
use voicedesk_db::cache::VersionCheck;
use voicedesk_db::{
    connect_with_settings, migrations, CacheAside, CacheStore, DbPool, InMemoryCacheStore,
    SqlCacheStore,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub cache: CacheAside,
    pub repos: Repositories,
    pub default_agent: Option<ReconcileOutcome>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects, migrates, gates the cache on the running version, then reconciles the default
/// agent. Reconciliation only ever runs against a migrated schema.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let cache = CacheAside::new(cache_store(config.cache.backend, &db_pool));
    check_cache_version(&cache, &config.cache.version).await;

    let repos = Repositories::sqlite(db_pool.clone());
    let default_agent = initialize(repos.clone(), &config).await;

    Ok(Application { config, db_pool, cache, repos, default_agent })
}

/// Runs the one-shot default agent reconciliation. Failures are logged, never raised.
pub async fn initialize(repos: Repositories, config: &AppConfig) -> Option<ReconcileOutcome> {
    let document = ModuleDocument::new(config.modules.document_paths.clone());
    let reconciler = DefaultAgentReconciler::new(repos, document);
    initialize_default_agent(&reconciler).await
}

pub fn cache_store(backend: CacheBackend, db_pool: &DbPool) -> Arc<dyn CacheStore> {
    match backend {
        CacheBackend::Memory => Arc::new(InMemoryCacheStore::default()),
        CacheBackend::Sqlite => Arc::new(SqlCacheStore::new(db_pool.clone())),
    }
}

async fn check_cache_version(cache: &CacheAside, version: &str) {
    match cache.ensure_version(version).await {
        Ok(VersionCheck::Current) => debug!(
            event_name = "system.bootstrap.cache_current",
            correlation_id = "bootstrap",
            version,
            "cache version unchanged"
        ),
        Ok(VersionCheck::Refreshed { .. }) => {}
        Err(error) => warn!(
            event_name = "system.bootstrap.cache_version_failed",
            correlation_id = "bootstrap",
            error = %error,
            "cache version gate failed; continuing with existing entries"
        ),
    }
}
