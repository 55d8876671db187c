//! Agent writes that land together: the agent row, its plugin mapping diff and any chat
//! history purge.

use std::sync::Arc;

use voicedesk_core::domain::agent::{AgentId, AgentRecord};
use voicedesk_core::plugins::PluginMappingDiff;

use super::agent::{insert_agent, update_agent};
use super::chat_history::purge_history;
use super::plugin_mapping::{delete_mappings, insert_mappings, update_mappings};
use super::{
    AgentRepository, AgentUnitOfWork, ChatHistoryPurge, ChatHistoryRepository,
    PluginMappingRepository, RepositoryError,
};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq)]
pub enum AgentWrite {
    Insert(AgentRecord),
    Update(AgentRecord),
}

/// Pending writes for one agent. Empty diff partitions issue no statements.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentChangeSet {
    pub agent_id: AgentId,
    pub agent: Option<AgentWrite>,
    pub plugins: PluginMappingDiff,
    pub purge: Option<ChatHistoryPurge>,
}

impl AgentChangeSet {
    pub fn insert(agent: AgentRecord) -> Self {
        Self::for_agent(agent.id.clone(), Some(AgentWrite::Insert(agent)))
    }

    pub fn update(agent: AgentRecord) -> Self {
        Self::for_agent(agent.id.clone(), Some(AgentWrite::Update(agent)))
    }

    /// Plugin changes for an agent whose row stays as it is.
    pub fn plugins_only(agent_id: AgentId, plugins: PluginMappingDiff) -> Self {
        Self::for_agent(agent_id, None).with_plugins(plugins)
    }

    pub fn with_plugins(mut self, plugins: PluginMappingDiff) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_purge(mut self, purge: Option<ChatHistoryPurge>) -> Self {
        self.purge = purge;
        self
    }

    fn for_agent(agent_id: AgentId, agent: Option<AgentWrite>) -> Self {
        Self { agent_id, agent, plugins: PluginMappingDiff::default(), purge: None }
    }
}

/// Commits a change set in one SQLite transaction.
pub struct SqlAgentUnitOfWork {
    pool: DbPool,
}

impl SqlAgentUnitOfWork {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AgentUnitOfWork for SqlAgentUnitOfWork {
    async fn commit(&self, changes: AgentChangeSet) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        match &changes.agent {
            Some(AgentWrite::Insert(agent)) => insert_agent(&mut *tx, agent).await?,
            Some(AgentWrite::Update(agent)) => update_agent(&mut *tx, agent).await?,
            None => {}
        }

        let diff = &changes.plugins;
        if !diff.to_delete.is_empty() {
            delete_mappings(&mut *tx, &diff.to_delete).await?;
        }
        if !diff.to_update.is_empty() {
            update_mappings(&mut *tx, &diff.to_update).await?;
        }
        if !diff.to_create.is_empty() {
            insert_mappings(&mut *tx, &diff.to_create).await?;
        }

        let purged = match changes.purge {
            Some(purge) => purge_history(&mut *tx, &changes.agent_id, purge).await?,
            None => 0,
        };

        tx.commit().await?;
        Ok(purged)
    }
}

/// Commits a change set through plain repositories, agent row first, stopping at the first
/// failure. Steps already applied stay applied; meant for the in-memory stores.
pub struct SequentialAgentUnitOfWork {
    agents: Arc<dyn AgentRepository>,
    mappings: Arc<dyn PluginMappingRepository>,
    history: Arc<dyn ChatHistoryRepository>,
}

impl SequentialAgentUnitOfWork {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        mappings: Arc<dyn PluginMappingRepository>,
        history: Arc<dyn ChatHistoryRepository>,
    ) -> Self {
        Self { agents, mappings, history }
    }
}

#[async_trait::async_trait]
impl AgentUnitOfWork for SequentialAgentUnitOfWork {
    async fn commit(&self, changes: AgentChangeSet) -> Result<u64, RepositoryError> {
        match changes.agent {
            Some(AgentWrite::Insert(agent)) => self.agents.insert(agent).await?,
            Some(AgentWrite::Update(agent)) => self.agents.update(agent).await?,
            None => {}
        }

        let diff = changes.plugins;
        if !diff.to_delete.is_empty() {
            self.mappings.delete_batch(&diff.to_delete).await?;
        }
        if !diff.to_update.is_empty() {
            self.mappings.update_batch(diff.to_update).await?;
        }
        if !diff.to_create.is_empty() {
            self.mappings.insert_batch(diff.to_create).await?;
        }

        match changes.purge {
            Some(purge) => self.history.purge_by_agent(&changes.agent_id, purge).await,
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Map;

    use voicedesk_core::domain::agent::AgentId;
    use voicedesk_core::domain::plugin::{AgentPluginMapping, PluginId};
    use voicedesk_core::plugins::PluginMappingDiff;

    use super::{AgentChangeSet, SequentialAgentUnitOfWork, SqlAgentUnitOfWork};
    use crate::connect_migrated_in_memory;
    use crate::fixtures::{fixed_timestamp, sample_agent};
    use crate::repositories::{
        AgentRepository, AgentUnitOfWork, ChatHistoryEntry, ChatHistoryPurge,
        ChatHistoryRepository, InMemoryAgentRepository, InMemoryChatHistoryRepository,
        InMemoryPluginMappingRepository, PluginMappingRepository, SqlAgentRepository,
        SqlChatHistoryRepository, SqlPluginMappingRepository,
    };

    fn mapping(agent: &AgentId, plugin: &str) -> AgentPluginMapping {
        AgentPluginMapping {
            id: None,
            agent_id: agent.clone(),
            plugin_id: PluginId::new(plugin),
            param_info: Map::new(),
        }
    }

    fn entry(agent: &AgentId) -> ChatHistoryEntry {
        ChatHistoryEntry {
            id: None,
            agent_id: agent.clone(),
            session_id: "s-1".to_string(),
            chat_type: 1,
            content: Some("hello".to_string()),
            audio_id: Some("audio-1".to_string()),
            created_at: fixed_timestamp(),
        }
    }

    #[tokio::test]
    async fn insert_with_plugins_commits_together() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let unit = SqlAgentUnitOfWork::new(pool.clone());
        let agent = sample_agent("a-1");
        let plugins = PluginMappingDiff {
            to_create: vec![mapping(&agent.id, "SYSTEM_PLUGIN_MUSIC")],
            ..PluginMappingDiff::default()
        };

        unit.commit(AgentChangeSet::insert(agent.clone()).with_plugins(plugins))
            .await
            .expect("commit");

        let stored = SqlAgentRepository::new(pool.clone()).find_by_id(&agent.id).await.expect("find");
        let rows = SqlPluginMappingRepository::new(pool).list_by_agent(&agent.id).await.expect("list");
        assert_eq!(stored, Some(agent));
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn failure_late_in_the_set_rolls_back_every_write() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let agents = SqlAgentRepository::new(pool.clone());
        let mappings = SqlPluginMappingRepository::new(pool.clone());
        let history = SqlChatHistoryRepository::new(pool.clone());
        let agent = sample_agent("a-1");
        agents.insert(agent.clone()).await.expect("insert agent");
        mappings
            .insert_batch(vec![mapping(&agent.id, "SYSTEM_PLUGIN_MUSIC")])
            .await
            .expect("insert mapping");
        history.append(entry(&agent.id)).await.expect("append");
        sqlx::query(
            "CREATE TRIGGER history_locked BEFORE DELETE ON ai_agent_chat_history
             BEGIN SELECT RAISE(ABORT, 'history is locked'); END",
        )
        .execute(&pool)
        .await
        .expect("create trigger");

        let existing = mappings.list_by_agent(&agent.id).await.expect("list");
        let mut renamed = agent.clone();
        renamed.agent_name = "Renamed".to_string();
        let plugins = PluginMappingDiff {
            to_create: vec![mapping(&agent.id, "CUSTOM_PLUGIN_TIMER")],
            to_update: Vec::new(),
            to_delete: existing.iter().filter_map(|row| row.id).collect(),
        };
        let result = SqlAgentUnitOfWork::new(pool.clone())
            .commit(
                AgentChangeSet::update(renamed)
                    .with_plugins(plugins)
                    .with_purge(Some(ChatHistoryPurge::All)),
            )
            .await;

        assert!(result.is_err());
        let stored = agents.find_by_id(&agent.id).await.expect("find").expect("exists");
        assert_eq!(stored.agent_name, agent.agent_name);
        assert_eq!(mappings.list_by_agent(&agent.id).await.expect("list"), existing);
        assert_eq!(history.list_by_agent(&agent.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn sequential_commit_skips_empty_partitions() {
        let agents = Arc::new(InMemoryAgentRepository::default());
        let mappings = Arc::new(InMemoryPluginMappingRepository::default());
        let history = Arc::new(InMemoryChatHistoryRepository::default());
        let agent = sample_agent("a-1");
        agents.insert(agent.clone()).await.expect("insert");
        history.append(entry(&agent.id)).await.expect("append");
        let unit = SequentialAgentUnitOfWork::new(agents.clone(), mappings.clone(), history.clone());

        let purged = unit
            .commit(AgentChangeSet::update(agent.clone()).with_purge(Some(ChatHistoryPurge::AudioOnly)))
            .await
            .expect("commit");

        assert_eq!(purged, 1);
        assert_eq!(agents.write_count(), 2);
        assert_eq!(mappings.batch_calls(), (0, 0, 0));
    }
}
