use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use voicedesk_core::domain::agent::{AgentId, AgentRecord};
use voicedesk_core::domain::model::{ModelBasicInfo, ModelCategory, ModelConfig, ModelId};
use voicedesk_core::domain::plugin::{
    AgentPluginMapping, PluginId, PluginMappingId, PluginProvider,
};
use voicedesk_core::domain::template::AgentTemplate;
use voicedesk_core::domain::timbre::{Timbre, TimbreId};
use voicedesk_core::domain::user::{User, UserId};

pub mod agent;
pub mod chat_history;
pub mod memory;
pub mod model;
pub mod plugin_mapping;
pub mod template;
pub mod timbre;
pub mod unit_of_work;
pub mod user;

pub use agent::SqlAgentRepository;
pub use chat_history::{ChatHistoryEntry, ChatHistoryPurge, SqlChatHistoryRepository};
pub use memory::{
    InMemoryAgentRepository, InMemoryChatHistoryRepository, InMemoryModelConfigRepository,
    InMemoryPluginMappingRepository, InMemoryPluginProviderRepository,
    InMemoryTemplateRepository, InMemoryTimbreRepository, InMemoryUserRepository,
};
pub use model::{SqlModelConfigRepository, SqlPluginProviderRepository};
pub use plugin_mapping::SqlPluginMappingRepository;
pub use template::SqlTemplateRepository;
pub use timbre::SqlTimbreRepository;
pub use unit_of_work::{
    AgentChangeSet, AgentWrite, SequentialAgentUnitOfWork, SqlAgentUnitOfWork,
};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentRecord>, RepositoryError>;
    async fn insert(&self, agent: AgentRecord) -> Result<(), RepositoryError>;
    async fn update(&self, agent: AgentRecord) -> Result<(), RepositoryError>;
    async fn device_count(&self, id: &AgentId) -> Result<i64, RepositoryError>;
}

/// Writes that must succeed or fail as one: an agent row, its plugin diff and a history purge.
#[async_trait]
pub trait AgentUnitOfWork: Send + Sync {
    /// Returns the number of chat history rows the purge touched.
    async fn commit(&self, changes: AgentChangeSet) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// The template flagged as default with the lowest sort, else the lowest sort overall.
    async fn default_template(&self) -> Result<Option<AgentTemplate>, RepositoryError>;
}

/// Model catalog lookups used by module resolution.
#[async_trait]
pub trait ModelConfigRepository: Send + Sync {
    async fn find_by_id(&self, id: &ModelId) -> Result<Option<ModelConfig>, RepositoryError>;

    /// Enabled models of `category`, optionally narrowed by a name substring, in sort order.
    async fn list_codes(
        &self,
        category: ModelCategory,
        name_query: Option<&str>,
    ) -> Result<Vec<ModelBasicInfo>, RepositoryError>;

    async fn save(&self, model: ModelConfig) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PluginProviderRepository: Send + Sync {
    async fn find_by_id(&self, id: &PluginId) -> Result<Option<PluginProvider>, RepositoryError>;
    async fn save(&self, provider: PluginProvider) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PluginMappingRepository: Send + Sync {
    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<AgentPluginMapping>, RepositoryError>;
    async fn insert_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError>;
    /// Rewrites `param_info` of rows identified by their id.
    async fn update_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError>;
    async fn delete_batch(&self, ids: &[PluginMappingId]) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TimbreRepository: Send + Sync {
    async fn find_by_id(&self, id: &TimbreId) -> Result<Option<Timbre>, RepositoryError>;
    /// First voice of `tts_model_id` whose code is `voice_code`, in sort order.
    async fn find_by_voice_code(
        &self,
        tts_model_id: &ModelId,
        voice_code: &str,
    ) -> Result<Option<Timbre>, RepositoryError>;
    async fn insert(&self, timbre: Timbre) -> Result<(), RepositoryError>;
    /// Returns `false` when no row carries the timbre's id.
    async fn update(&self, timbre: Timbre) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    async fn append(&self, entry: ChatHistoryEntry) -> Result<(), RepositoryError>;
    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatHistoryEntry>, RepositoryError>;
    /// Returns the number of rows affected.
    async fn purge_by_agent(
        &self,
        agent_id: &AgentId,
        purge: ChatHistoryPurge,
    ) -> Result<u64, RepositoryError>;
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    field: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|err| RepositoryError::Decode(format!("invalid {} json: {}", field, err)))
}

pub(crate) fn to_json<T: serde::Serialize>(field: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|err| RepositoryError::Decode(format!("could not encode {}: {}", field, err)))
}
