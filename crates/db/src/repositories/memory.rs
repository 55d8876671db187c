use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use voicedesk_core::domain::agent::{AgentId, AgentRecord};
use voicedesk_core::domain::model::{ModelBasicInfo, ModelCategory, ModelConfig, ModelId};
use voicedesk_core::domain::plugin::{
    AgentPluginMapping, PluginId, PluginMappingId, PluginProvider,
};
use voicedesk_core::domain::template::AgentTemplate;
use voicedesk_core::domain::timbre::{Timbre, TimbreId};
use voicedesk_core::domain::user::{User, UserId};

use super::{
    AgentRepository, ChatHistoryEntry, ChatHistoryPurge, ChatHistoryRepository,
    ModelConfigRepository, PluginMappingRepository, PluginProviderRepository, RepositoryError,
    TemplateRepository, TimbreRepository, UserRepository,
};

/// Agent store that also counts writes and device lookups, so callers can assert on them.
#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: RwLock<HashMap<String, AgentRecord>>,
    device_counts: RwLock<HashMap<String, i64>>,
    writes: AtomicUsize,
    device_lookups: AtomicUsize,
}

impl InMemoryAgentRepository {
    pub async fn set_device_count(&self, id: &AgentId, count: i64) {
        self.device_counts.write().await.insert(id.0.clone(), count);
    }

    /// Inserts plus updates performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn device_lookups(&self) -> usize {
        self.device_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentRecord>, RepositoryError> {
        let agents = self.agents.read().await;
        Ok(agents.get(&id.0).cloned())
    }

    async fn insert(&self, agent: AgentRecord) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent.id.0) {
            return Err(RepositoryError::Conflict(format!("agent `{}` already exists", agent.id)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        agents.insert(agent.id.0.clone(), agent);
        Ok(())
    }

    async fn update(&self, agent: AgentRecord) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write().await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(slot) = agents.get_mut(&agent.id.0) {
            *slot = agent;
        }
        Ok(())
    }

    async fn device_count(&self, id: &AgentId) -> Result<i64, RepositoryError> {
        self.device_lookups.fetch_add(1, Ordering::SeqCst);
        let counts = self.device_counts.read().await;
        Ok(counts.get(&id.0).copied().unwrap_or(0))
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<Vec<AgentTemplate>>,
}

impl InMemoryTemplateRepository {
    pub fn with_templates(templates: impl IntoIterator<Item = AgentTemplate>) -> Self {
        Self { templates: RwLock::new(templates.into_iter().collect()) }
    }
}

#[async_trait::async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn default_template(&self) -> Result<Option<AgentTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates
            .iter()
            .min_by(|left, right| {
                right
                    .is_default
                    .cmp(&left.is_default)
                    .then(left.sort.cmp(&right.sort))
                    .then(left.id.0.cmp(&right.id.0))
            })
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryModelConfigRepository {
    models: RwLock<HashMap<String, ModelConfig>>,
}

impl InMemoryModelConfigRepository {
    pub fn with_models(models: impl IntoIterator<Item = ModelConfig>) -> Self {
        Self {
            models: RwLock::new(
                models.into_iter().map(|model| (model.id.0.clone(), model)).collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl ModelConfigRepository for InMemoryModelConfigRepository {
    async fn find_by_id(&self, id: &ModelId) -> Result<Option<ModelConfig>, RepositoryError> {
        let models = self.models.read().await;
        Ok(models.get(&id.0).cloned())
    }

    async fn list_codes(
        &self,
        category: ModelCategory,
        name_query: Option<&str>,
    ) -> Result<Vec<ModelBasicInfo>, RepositoryError> {
        let needle = name_query.map(|query| query.trim().to_ascii_lowercase());
        let models = self.models.read().await;
        let mut matching: Vec<&ModelConfig> = models
            .values()
            .filter(|model| model.category == category && model.is_enabled)
            .filter(|model| {
                needle
                    .as_deref()
                    .map(|needle| model.model_name.to_ascii_lowercase().contains(needle))
                    .unwrap_or(true)
            })
            .collect();
        matching.sort_by(|left, right| left.sort.cmp(&right.sort).then(left.id.cmp(&right.id)));

        Ok(matching
            .into_iter()
            .map(|model| ModelBasicInfo { id: model.id.clone(), model_name: model.model_name.clone() })
            .collect())
    }

    async fn save(&self, model: ModelConfig) -> Result<(), RepositoryError> {
        let mut models = self.models.write().await;
        models.insert(model.id.0.clone(), model);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPluginProviderRepository {
    providers: RwLock<HashMap<String, PluginProvider>>,
}

impl InMemoryPluginProviderRepository {
    pub fn with_providers(providers: impl IntoIterator<Item = PluginProvider>) -> Self {
        Self {
            providers: RwLock::new(
                providers.into_iter().map(|provider| (provider.id.0.clone(), provider)).collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl PluginProviderRepository for InMemoryPluginProviderRepository {
    async fn find_by_id(&self, id: &PluginId) -> Result<Option<PluginProvider>, RepositoryError> {
        let providers = self.providers.read().await;
        Ok(providers.get(&id.0).cloned())
    }

    async fn save(&self, provider: PluginProvider) -> Result<(), RepositoryError> {
        let mut providers = self.providers.write().await;
        providers.insert(provider.id.0.clone(), provider);
        Ok(())
    }
}

#[derive(Default)]
struct MappingTable {
    rows: Vec<AgentPluginMapping>,
    next_id: i64,
}

/// Mapping store that records how many batch calls of each kind it received.
#[derive(Default)]
pub struct InMemoryPluginMappingRepository {
    table: RwLock<MappingTable>,
    insert_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryPluginMappingRepository {
    /// `(insert, update, delete)` batch calls received so far.
    pub fn batch_calls(&self) -> (usize, usize, usize) {
        (
            self.insert_calls.load(Ordering::SeqCst),
            self.update_calls.load(Ordering::SeqCst),
            self.delete_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait::async_trait]
impl PluginMappingRepository for InMemoryPluginMappingRepository {
    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<AgentPluginMapping>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.iter().filter(|row| &row.agent_id == agent_id).cloned().collect())
    }

    async fn insert_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut table = self.table.write().await;
        for (index, row) in rows.iter().enumerate() {
            let clashes_with_stored = table
                .rows
                .iter()
                .any(|stored| stored.agent_id == row.agent_id && stored.plugin_id == row.plugin_id);
            let clashes_within_batch = rows[..index]
                .iter()
                .any(|other| other.agent_id == row.agent_id && other.plugin_id == row.plugin_id);
            if clashes_with_stored || clashes_within_batch {
                return Err(RepositoryError::Conflict(format!(
                    "plugin `{}` is already mapped to agent `{}`",
                    row.plugin_id.0, row.agent_id
                )));
            }
        }
        for mut row in rows {
            table.next_id += 1;
            row.id = Some(PluginMappingId(table.next_id));
            table.rows.push(row);
        }
        Ok(())
    }

    async fn update_batch(&self, rows: Vec<AgentPluginMapping>) -> Result<(), RepositoryError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut table = self.table.write().await;
        for row in rows {
            let id = row.id.ok_or_else(|| {
                RepositoryError::Decode(format!(
                    "plugin mapping for `{}` has no id to update",
                    row.plugin_id.0
                ))
            })?;
            if let Some(stored) = table.rows.iter_mut().find(|stored| stored.id == Some(id)) {
                stored.param_info = row.param_info;
            }
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[PluginMappingId]) -> Result<(), RepositoryError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut table = self.table.write().await;
        table.rows.retain(|row| row.id.map(|id| !ids.contains(&id)).unwrap_or(true));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTimbreRepository {
    timbres: RwLock<HashMap<String, Timbre>>,
    lookups: AtomicUsize,
}

impl InMemoryTimbreRepository {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TimbreRepository for InMemoryTimbreRepository {
    async fn find_by_id(&self, id: &TimbreId) -> Result<Option<Timbre>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let timbres = self.timbres.read().await;
        Ok(timbres.get(&id.0).cloned())
    }

    async fn find_by_voice_code(
        &self,
        tts_model_id: &ModelId,
        voice_code: &str,
    ) -> Result<Option<Timbre>, RepositoryError> {
        if voice_code.trim().is_empty() {
            return Ok(None);
        }
        let timbres = self.timbres.read().await;
        Ok(timbres
            .values()
            .filter(|timbre| &timbre.tts_model_id == tts_model_id && timbre.voice_code == voice_code)
            .min_by(|left, right| left.sort.cmp(&right.sort).then(left.id.0.cmp(&right.id.0)))
            .cloned())
    }

    async fn insert(&self, timbre: Timbre) -> Result<(), RepositoryError> {
        let mut timbres = self.timbres.write().await;
        if timbres.contains_key(&timbre.id.0) {
            return Err(RepositoryError::Conflict(format!(
                "timbre `{}` already exists",
                timbre.id.0
            )));
        }
        timbres.insert(timbre.id.0.clone(), timbre);
        Ok(())
    }

    async fn update(&self, timbre: Timbre) -> Result<bool, RepositoryError> {
        let mut timbres = self.timbres.write().await;
        match timbres.get_mut(&timbre.id.0) {
            Some(slot) => {
                *slot = timbre;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
    lookups: AtomicUsize,
}

impl InMemoryUserRepository {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0, user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChatHistoryRepository {
    entries: RwLock<Vec<ChatHistoryEntry>>,
}

#[async_trait::async_trait]
impl ChatHistoryRepository for InMemoryChatHistoryRepository {
    async fn append(&self, mut entry: ChatHistoryEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entry.id = Some(entries.len() as i64 + 1);
        entries.push(entry);
        Ok(())
    }

    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatHistoryEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|entry| &entry.agent_id == agent_id).cloned().collect())
    }

    async fn purge_by_agent(
        &self,
        agent_id: &AgentId,
        purge: ChatHistoryPurge,
    ) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let mut affected = 0;
        match purge {
            ChatHistoryPurge::All => {
                let before = entries.len();
                entries.retain(|entry| &entry.agent_id != agent_id);
                affected = (before - entries.len()) as u64;
            }
            ChatHistoryPurge::AudioOnly => {
                for entry in entries.iter_mut().filter(|entry| &entry.agent_id == agent_id) {
                    if entry.audio_id.take().is_some() {
                        affected += 1;
                    }
                }
            }
        }
        Ok(affected)
    }
}
