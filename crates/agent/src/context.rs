use std::sync::Arc;

use voicedesk_db::repositories::{
    AgentRepository, AgentUnitOfWork, ChatHistoryRepository, ModelConfigRepository,
    PluginMappingRepository, PluginProviderRepository, SqlAgentRepository,
    SqlAgentUnitOfWork, SqlChatHistoryRepository, SqlModelConfigRepository,
    SqlPluginMappingRepository, SqlPluginProviderRepository, SqlTemplateRepository,
    SqlTimbreRepository, SqlUserRepository, TemplateRepository, TimbreRepository,
    UserRepository,
};
use voicedesk_db::DbPool;

/// Every repository the services depend on, shared behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub agents: Arc<dyn AgentRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub models: Arc<dyn ModelConfigRepository>,
    pub plugin_providers: Arc<dyn PluginProviderRepository>,
    pub plugin_mappings: Arc<dyn PluginMappingRepository>,
    pub timbres: Arc<dyn TimbreRepository>,
    pub users: Arc<dyn UserRepository>,
    pub chat_history: Arc<dyn ChatHistoryRepository>,
    /// Agent row, plugin and history writes that commit together.
    pub agent_writes: Arc<dyn AgentUnitOfWork>,
}

impl Repositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            agents: Arc::new(SqlAgentRepository::new(pool.clone())),
            templates: Arc::new(SqlTemplateRepository::new(pool.clone())),
            models: Arc::new(SqlModelConfigRepository::new(pool.clone())),
            plugin_providers: Arc::new(SqlPluginProviderRepository::new(pool.clone())),
            plugin_mappings: Arc::new(SqlPluginMappingRepository::new(pool.clone())),
            timbres: Arc::new(SqlTimbreRepository::new(pool.clone())),
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            chat_history: Arc::new(SqlChatHistoryRepository::new(pool.clone())),
            agent_writes: Arc::new(SqlAgentUnitOfWork::new(pool)),
        }
    }
}
