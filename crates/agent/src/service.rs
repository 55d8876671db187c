use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use voicedesk_core::domain::agent::{AgentCreate, AgentId, AgentPatch, AgentRecord, ChatHistoryMode};
use voicedesk_core::domain::model::{ModelId, INTENT_FUNCTION_CALL};
use voicedesk_core::domain::plugin::DesiredPlugin;
use voicedesk_core::domain::user::UserId;
use voicedesk_core::errors::DomainError;
use voicedesk_core::plugins::{diff_plugin_mappings, PluginMappingDiff};
use voicedesk_db::cache::{keys, CacheAside};
use voicedesk_db::repositories::{AgentChangeSet, ChatHistoryPurge};

use crate::context::Repositories;
use crate::errors::ServiceError;
use crate::plugins::{default_plugin_mappings, log_applied_diff};

/// LLM provider families that support native function calling.
const FUNCTION_CALL_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Agent edit request: field changes plus, optionally, the complete plugin list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(flatten)]
    pub patch: AgentPatch,
    #[serde(default)]
    pub functions: Option<Vec<DesiredPlugin>>,
}

pub struct AgentService {
    repos: Repositories,
    cache: CacheAside,
}

impl AgentService {
    pub fn new(repos: Repositories, cache: CacheAside) -> Self {
        Self { repos, cache }
    }

    pub async fn find(&self, id: &AgentId) -> Result<AgentRecord, ServiceError> {
        self.repos
            .agents
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::AgentNotFound(id.clone()).into())
    }

    /// Creates a user-owned agent from the default template together with the system
    /// plugins. The agent row and its plugins are committed as one unit.
    pub async fn create_agent(
        &self,
        input: AgentCreate,
        owner: UserId,
    ) -> Result<AgentRecord, ServiceError> {
        let agent_name = input.agent_name.trim();
        if agent_name.is_empty() {
            return Err(DomainError::InvariantViolation("agent name must not be blank".to_string())
                .into());
        }
        let template = self.repos.templates.default_template().await?.ok_or_else(|| {
            DomainError::InvariantViolation("no agent template is configured".to_string())
        })?;
        let tts_voice_id = match &template.tts_voice_id {
            Some(voice) => Some(voice.clone()),
            None => self.configured_voice_id(template.tts_model_id.as_ref()).await?,
        };

        let now = Utc::now();
        let record = AgentRecord {
            id: AgentId::generate(),
            agent_code: Some(
                input.agent_code.unwrap_or_else(|| format!("AGT_{}", now.timestamp_millis())),
            ),
            agent_name: agent_name.to_string(),
            owner: Some(owner),
            asr_model_id: template.asr_model_id.clone(),
            vad_model_id: template.vad_model_id.clone(),
            llm_model_id: template.llm_model_id.clone(),
            vllm_model_id: template.vllm_model_id.clone(),
            tts_model_id: template.tts_model_id.clone(),
            mem_model_id: template.mem_model_id.clone(),
            intent_model_id: template.intent_model_id.clone(),
            tts_voice_id,
            system_prompt: template.system_prompt.clone(),
            summary_memory: template.summary_memory.clone(),
            chat_history_mode: Some(ChatHistoryMode::for_memory(template.mem_model_id.as_ref())),
            lang_code: template.lang_code.clone(),
            language: template.language.clone(),
            sort: template.sort,
            creator: Some(owner),
            created_at: now,
            updater: Some(owner),
            updated_at: now,
        };

        let plugins =
            default_plugin_mappings(self.repos.plugin_providers.as_ref(), &record.id).await?;
        let seeded = plugins.len();
        let changes = AgentChangeSet::insert(record.clone())
            .with_plugins(PluginMappingDiff { to_create: plugins, ..PluginMappingDiff::default() });
        self.repos.agent_writes.commit(changes).await?;

        info!(
            event_name = "agent.created",
            correlation_id = %record.id,
            agent_id = %record.id,
            owner = %owner,
            plugins_seeded = seeded,
            "agent created"
        );
        Ok(record)
    }

    /// Applies an edit: validates the submitted model pairing, then commits the record, the
    /// plugin diff (when a list was submitted) and the memory retention purge as one unit.
    pub async fn update_agent(
        &self,
        id: &AgentId,
        update: AgentUpdate,
        updater: Option<UserId>,
    ) -> Result<AgentRecord, ServiceError> {
        let current = self.find(id).await?;
        self.validate_intent_pairing(&update.patch).await?;

        let plugins = match &update.functions {
            Some(functions) => self.plugin_diff(id, functions).await?,
            None => PluginMappingDiff::default(),
        };
        let mut next = update.patch.apply(&current);
        next.updater = updater;
        next.updated_at = Utc::now();
        let purge = retention_purge(&mut next);

        let changes = AgentChangeSet::update(next.clone())
            .with_plugins(plugins.clone())
            .with_purge(purge);
        let purged = self.repos.agent_writes.commit(changes).await?;

        if update.functions.is_some() {
            log_applied_diff(id, &plugins);
        }
        if purge == Some(ChatHistoryPurge::All) {
            info!(
                event_name = "agent.memory.history_purged",
                correlation_id = %id,
                agent_id = %id,
                mem_model_id = next.mem_model_id.as_ref().map(ModelId::as_str).unwrap_or("none"),
                purged,
                "memory disabled; chat history removed"
            );
        }
        info!(
            event_name = "agent.updated",
            correlation_id = %id,
            agent_id = %id,
            changed = ?update.patch.changed_fields(),
            plugins_submitted = update.functions.is_some(),
            "agent updated"
        );
        Ok(next)
    }

    /// Brings the agent's plugin mappings in line with `desired` and returns the applied diff.
    pub async fn reconcile_plugins(
        &self,
        id: &AgentId,
        desired: &[DesiredPlugin],
    ) -> Result<PluginMappingDiff, ServiceError> {
        self.find(id).await?;
        let diff = self.plugin_diff(id, desired).await?;
        self.repos
            .agent_writes
            .commit(AgentChangeSet::plugins_only(id.clone(), diff.clone()))
            .await?;
        log_applied_diff(id, &diff);
        Ok(diff)
    }

    /// Number of devices bound to the agent, cached for a minute.
    pub async fn device_count(&self, id: &AgentId) -> Result<i64, ServiceError> {
        let agents = &self.repos.agents;
        let count = self
            .cache
            .get_or_load(&keys::agent_device_count(id), keys::DEVICE_COUNT_TTL, move || async move {
                agents.device_count(id).await.map(Some)
            })
            .await
            .map_err(ServiceError::from)?;
        Ok(count.unwrap_or(0))
    }

    async fn plugin_diff(
        &self,
        id: &AgentId,
        desired: &[DesiredPlugin],
    ) -> Result<PluginMappingDiff, ServiceError> {
        let existing = self.repos.plugin_mappings.list_by_agent(id).await?;
        Ok(diff_plugin_mappings(id, &existing, desired))
    }

    /// Timbre matching the voice the TTS model itself is configured with.
    async fn configured_voice_id(
        &self,
        tts_model_id: Option<&ModelId>,
    ) -> Result<Option<String>, ServiceError> {
        let Some(tts_model_id) = tts_model_id else {
            return Ok(None);
        };
        let Some(model) = self.repos.models.find_by_id(tts_model_id).await? else {
            return Ok(None);
        };
        let Some(voice_code) = model.configured_voice() else {
            return Ok(None);
        };
        let timbre = self.repos.timbres.find_by_voice_code(tts_model_id, voice_code).await?;
        Ok(timbre.map(|timbre| timbre.id.0))
    }

    /// Only the submitted pair is checked; fields the edit leaves alone are not revalidated.
    async fn validate_intent_pairing(&self, patch: &AgentPatch) -> Result<(), ServiceError> {
        let Some(llm) = patch.llm_model_id.as_ref().filter(|llm| !llm.as_str().trim().is_empty())
        else {
            return Ok(());
        };
        let Some(intent) =
            patch.intent_model_id.as_ref().filter(|intent| intent.as_str() == INTENT_FUNCTION_CALL)
        else {
            return Ok(());
        };
        let Some(model) = self.repos.models.find_by_id(llm).await? else {
            return Ok(());
        };
        let supported = model
            .provider_type()
            .is_some_and(|provider| FUNCTION_CALL_PROVIDERS.iter().any(|known| *known == provider));
        if supported {
            Ok(())
        } else {
            Err(DomainError::LlmIntentMismatch { llm: llm.clone(), intent: intent.clone() }.into())
        }
    }
}

/// Without memory nothing is retained; text-only history drops recorded audio.
fn retention_purge(agent: &mut AgentRecord) -> Option<ChatHistoryPurge> {
    if agent.has_no_memory() {
        agent.summary_memory = None;
        Some(ChatHistoryPurge::All)
    } else if agent.chat_history_mode == Some(ChatHistoryMode::TextOnly) {
        Some(ChatHistoryPurge::AudioOnly)
    } else {
        None
    }
}
