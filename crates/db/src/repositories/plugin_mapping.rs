use serde_json::{Map, Value};
use sqlx::{Row, SqliteConnection};

use voicedesk_core::domain::agent::AgentId;
use voicedesk_core::domain::plugin::{AgentPluginMapping, PluginId, PluginMappingId};

use super::{parse_json, to_json, PluginMappingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPluginMappingRepository {
    pool: DbPool,
}

impl SqlPluginMappingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_mapping(row: &sqlx::sqlite::SqliteRow) -> Result<AgentPluginMapping, RepositoryError> {
    let param_info: String = row.try_get("param_info")?;
    let param_info: Map<String, Value> = parse_json("param_info", &param_info)?;

    Ok(AgentPluginMapping {
        id: Some(PluginMappingId(row.try_get("id")?)),
        agent_id: AgentId(row.try_get("agent_id")?),
        plugin_id: PluginId(row.try_get("plugin_id")?),
        param_info,
    })
}

#[async_trait::async_trait]
impl PluginMappingRepository for SqlPluginMappingRepository {
    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<AgentPluginMapping>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, agent_id, plugin_id, param_info
             FROM ai_agent_plugin_mapping WHERE agent_id = ? ORDER BY id ASC",
        )
        .bind(&agent_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mapping).collect()
    }

    async fn insert_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_mappings(&mut *tx, &rows).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_mappings(&mut *tx, &rows).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_batch(&self, ids: &[PluginMappingId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        delete_mappings(&mut *tx, ids).await?;
        tx.commit().await?;
        Ok(())
    }
}

pub(crate) async fn insert_mappings(
    conn: &mut SqliteConnection,
    rows: &[AgentPluginMapping],
) -> Result<(), RepositoryError> {
    for mapping in rows {
        let result = sqlx::query(
            "INSERT INTO ai_agent_plugin_mapping (agent_id, plugin_id, param_info)
             VALUES (?, ?, ?)",
        )
        .bind(&mapping.agent_id.0)
        .bind(&mapping.plugin_id.0)
        .bind(to_json("param_info", &mapping.param_info)?)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(RepositoryError::Conflict(format!(
                    "plugin `{}` is already mapped to agent `{}`",
                    mapping.plugin_id.0, mapping.agent_id
                )));
            }
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}

pub(crate) async fn update_mappings(
    conn: &mut SqliteConnection,
    rows: &[AgentPluginMapping],
) -> Result<(), RepositoryError> {
    for mapping in rows {
        let id = mapping.id.ok_or_else(|| {
            RepositoryError::Decode(format!(
                "plugin mapping for `{}` has no id to update",
                mapping.plugin_id.0
            ))
        })?;
        sqlx::query("UPDATE ai_agent_plugin_mapping SET param_info = ? WHERE id = ?")
            .bind(to_json("param_info", &mapping.param_info)?)
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn delete_mappings(
    conn: &mut SqliteConnection,
    ids: &[PluginMappingId],
) -> Result<(), RepositoryError> {
    for id in ids {
        sqlx::query("DELETE FROM ai_agent_plugin_mapping WHERE id = ?")
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use voicedesk_core::domain::agent::AgentId;
    use voicedesk_core::domain::plugin::{AgentPluginMapping, PluginId};

    use super::SqlPluginMappingRepository;
    use crate::fixtures::sample_agent;
    use crate::repositories::{
        AgentRepository, PluginMappingRepository, RepositoryError, SqlAgentRepository,
    };
    use crate::{connect_migrated_in_memory, DbPool};

    async fn setup() -> (DbPool, AgentId) {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let agent = sample_agent("a-1");
        SqlAgentRepository::new(pool.clone()).insert(agent.clone()).await.expect("insert agent");
        (pool, agent.id)
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn mapping(agent: &AgentId, plugin: &str, value: Value) -> AgentPluginMapping {
        AgentPluginMapping {
            id: None,
            agent_id: agent.clone(),
            plugin_id: PluginId::new(plugin),
            param_info: params(value),
        }
    }

    #[tokio::test]
    async fn insert_batch_assigns_ids_in_insertion_order() {
        let (pool, agent) = setup().await;
        let repo = SqlPluginMappingRepository::new(pool);

        repo.insert_batch(vec![
            mapping(&agent, "SYSTEM_PLUGIN_MUSIC", json!({})),
            mapping(&agent, "SYSTEM_PLUGIN_WEATHER", json!({"default_location": "Oslo"})),
        ])
        .await
        .expect("insert");

        let rows = repo.list_by_agent(&agent).await.expect("list");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.id.is_some()));
        assert_eq!(rows[0].plugin_id.0, "SYSTEM_PLUGIN_MUSIC");
        assert_eq!(rows[1].param_info.get("default_location"), Some(&json!("Oslo")));
    }

    #[tokio::test]
    async fn duplicate_plugin_for_agent_is_a_conflict_and_rolls_back() {
        let (pool, agent) = setup().await;
        let repo = SqlPluginMappingRepository::new(pool);

        let error = repo
            .insert_batch(vec![
                mapping(&agent, "SYSTEM_PLUGIN_MUSIC", json!({})),
                mapping(&agent, "SYSTEM_PLUGIN_MUSIC", json!({})),
            ])
            .await
            .expect_err("duplicate should fail");

        assert!(matches!(error, RepositoryError::Conflict(_)));
        assert!(repo.list_by_agent(&agent).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_batches_touch_only_named_rows() {
        let (pool, agent) = setup().await;
        let repo = SqlPluginMappingRepository::new(pool);
        repo.insert_batch(vec![
            mapping(&agent, "A", json!({"v": 1})),
            mapping(&agent, "B", json!({"v": 2})),
            mapping(&agent, "C", json!({"v": 3})),
        ])
        .await
        .expect("insert");
        let rows = repo.list_by_agent(&agent).await.expect("list");

        let mut updated = rows[0].clone();
        updated.param_info = params(json!({"v": 10}));
        repo.update_batch(vec![updated]).await.expect("update");
        repo.delete_batch(&[rows[1].id.expect("id")]).await.expect("delete");

        let after = repo.list_by_agent(&agent).await.expect("list");
        let summary: Vec<(String, Value)> = after
            .iter()
            .map(|row| (row.plugin_id.0.clone(), row.param_info["v"].clone()))
            .collect();
        assert_eq!(summary, vec![("A".to_string(), json!(10)), ("C".to_string(), json!(3))]);
    }

    #[tokio::test]
    async fn update_without_id_is_rejected() {
        let (pool, agent) = setup().await;
        let repo = SqlPluginMappingRepository::new(pool);

        let error = repo
            .update_batch(vec![mapping(&agent, "A", json!({}))])
            .await
            .expect_err("row without id");

        assert!(matches!(error, RepositoryError::Decode(_)));
    }
}
