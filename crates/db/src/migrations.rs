use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_TABLES: &[&str] = &[
        "sys_user",
        "ai_model_config",
        "ai_model_provider",
        "ai_agent_template",
        "ai_agent",
        "ai_agent_plugin_mapping",
        "ai_device",
        "ai_tts_voice",
        "ai_agent_chat_history",
        "cache_entry",
    ];

    #[tokio::test]
    async fn migrations_create_managed_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("inspect sqlite_master")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "table `{table}` should exist after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_seed_default_template_and_system_plugins() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let templates: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ai_agent_template WHERE is_default = 1")
                .fetch_one(&pool)
                .await
                .expect("count templates");
        let plugins: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ai_model_provider WHERE model_type = 'Plugin'",
        )
        .fetch_one(&pool)
        .await
        .expect("count plugins");

        assert_eq!(templates, 1);
        assert_eq!(plugins, 3);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run should be a no-op");
    }
}
