use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::agent::AgentId;

/// Plugins every new agent starts with: music, weather and news.
pub const DEFAULT_PLUGIN_IDS: [&str; 3] =
    ["SYSTEM_PLUGIN_MUSIC", "SYSTEM_PLUGIN_WEATHER", "SYSTEM_PLUGIN_NEWS_NEWSNOW"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginMappingId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// Link between an agent and a plugin with the plugin's parameters.
///
/// `id` stays `None` until the row has been inserted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentPluginMapping {
    pub id: Option<PluginMappingId>,
    pub agent_id: AgentId,
    pub plugin_id: PluginId,
    pub param_info: Map<String, Value>,
}

/// One entry of the plugin list a caller wants an agent to end up with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesiredPlugin {
    pub plugin_id: PluginId,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl DesiredPlugin {
    pub fn new(plugin_id: impl Into<String>, params: Map<String, Value>) -> Self {
        Self { plugin_id: PluginId::new(plugin_id), params }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginField {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub default: Value,
}

/// Plugin entry of the provider catalog together with its parameter schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginProvider {
    pub id: PluginId,
    pub provider_code: String,
    pub name: String,
    pub fields: Vec<PluginField>,
    pub sort: i32,
}

impl PluginProvider {
    /// Parameter map seeded from each schema entry's default; keyless entries are skipped.
    pub fn default_params(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|field| field.key.as_ref().map(|key| (key.clone(), field.default.clone())))
            .collect()
    }
}
