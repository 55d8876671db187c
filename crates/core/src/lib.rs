pub mod config;
pub mod domain;
pub mod errors;
pub mod modules;
pub mod plugins;

pub use chrono;

pub use domain::agent::{
    AgentCreate, AgentId, AgentPatch, AgentRecord, ChatHistoryMode, DEFAULT_AGENT_ID,
};
pub use domain::model::{
    ModelBasicInfo, ModelCategory, ModelConfig, ModelId, INTENT_FUNCTION_CALL, MEMORY_NO_MEM,
};
pub use domain::plugin::{
    AgentPluginMapping, DesiredPlugin, PluginField, PluginId, PluginMappingId, PluginProvider,
    DEFAULT_PLUGIN_IDS,
};
pub use domain::template::{AgentTemplate, TemplateId};
pub use domain::timbre::{Timbre, TimbreData, TimbreId};
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DomainError};
pub use modules::{ModuleDocument, ModuleSelection};
pub use plugins::{diff_plugin_mappings, PluginMappingDiff};
