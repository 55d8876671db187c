use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::{ModelCategory, ModelId};
use crate::domain::user::UserId;

/// Well-known id of the system-owned default agent.
pub const DEFAULT_AGENT_ID: &str = "default_agent";
pub const DEFAULT_AGENT_CODE: &str = "DEFAULT_AGENT";
pub const DEFAULT_AGENT_NAME: &str = "Default Agent";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn default_agent() -> Self {
        Self(DEFAULT_AGENT_ID.to_string())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn is_default_agent(&self) -> bool {
        self.0 == DEFAULT_AGENT_ID
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much of a conversation is retained for later review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatHistoryMode {
    None,
    TextOnly,
    TextAndAudio,
    /// A stored code this build does not know; kept as is.
    Other(i64),
}

impl ChatHistoryMode {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::None => 0,
            Self::TextOnly => 1,
            Self::TextAndAudio => 2,
            Self::Other(raw) => raw,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::TextOnly,
            2 => Self::TextAndAudio,
            raw => Self::Other(raw),
        }
    }

    /// Mode implied by a memory selection: nothing is recorded without memory.
    pub fn for_memory(memory_model_id: Option<&ModelId>) -> Self {
        match memory_model_id {
            Some(id) if id.is_no_memory() => Self::None,
            _ => Self::TextAndAudio,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub agent_code: Option<String>,
    pub agent_name: String,
    pub owner: Option<UserId>,
    pub asr_model_id: Option<ModelId>,
    pub vad_model_id: Option<ModelId>,
    pub llm_model_id: Option<ModelId>,
    pub vllm_model_id: Option<ModelId>,
    pub tts_model_id: Option<ModelId>,
    pub mem_model_id: Option<ModelId>,
    pub intent_model_id: Option<ModelId>,
    pub tts_voice_id: Option<String>,
    pub system_prompt: Option<String>,
    pub summary_memory: Option<String>,
    pub chat_history_mode: Option<ChatHistoryMode>,
    pub lang_code: Option<String>,
    pub language: Option<String>,
    pub sort: i32,
    pub creator: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updater: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn model_id(&self, category: ModelCategory) -> Option<&ModelId> {
        match category {
            ModelCategory::Asr => self.asr_model_id.as_ref(),
            ModelCategory::Vad => self.vad_model_id.as_ref(),
            ModelCategory::Llm => self.llm_model_id.as_ref(),
            ModelCategory::Vllm => self.vllm_model_id.as_ref(),
            ModelCategory::Tts => self.tts_model_id.as_ref(),
            ModelCategory::Memory => self.mem_model_id.as_ref(),
            ModelCategory::Intent => self.intent_model_id.as_ref(),
        }
    }

    /// Memory unset or explicitly disabled.
    pub fn has_no_memory(&self) -> bool {
        self.mem_model_id.as_ref().map(ModelId::is_no_memory).unwrap_or(true)
    }
}

/// Partial update of an [`AgentRecord`]; `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPatch {
    pub agent_name: Option<String>,
    pub agent_code: Option<String>,
    pub asr_model_id: Option<ModelId>,
    pub vad_model_id: Option<ModelId>,
    pub llm_model_id: Option<ModelId>,
    pub vllm_model_id: Option<ModelId>,
    pub tts_model_id: Option<ModelId>,
    pub mem_model_id: Option<ModelId>,
    pub intent_model_id: Option<ModelId>,
    pub tts_voice_id: Option<String>,
    pub system_prompt: Option<String>,
    pub summary_memory: Option<String>,
    pub chat_history_mode: Option<ChatHistoryMode>,
    pub lang_code: Option<String>,
    pub language: Option<String>,
    pub sort: Option<i32>,
}

impl AgentPatch {
    pub fn set_model_id(&mut self, category: ModelCategory, id: ModelId) {
        let slot = match category {
            ModelCategory::Asr => &mut self.asr_model_id,
            ModelCategory::Vad => &mut self.vad_model_id,
            ModelCategory::Llm => &mut self.llm_model_id,
            ModelCategory::Vllm => &mut self.vllm_model_id,
            ModelCategory::Tts => &mut self.tts_model_id,
            ModelCategory::Memory => &mut self.mem_model_id,
            ModelCategory::Intent => &mut self.intent_model_id,
        };
        *slot = Some(id);
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields this patch would write, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let flags = [
            ("agent_name", self.agent_name.is_some()),
            ("agent_code", self.agent_code.is_some()),
            ("asr_model_id", self.asr_model_id.is_some()),
            ("vad_model_id", self.vad_model_id.is_some()),
            ("llm_model_id", self.llm_model_id.is_some()),
            ("vllm_model_id", self.vllm_model_id.is_some()),
            ("tts_model_id", self.tts_model_id.is_some()),
            ("mem_model_id", self.mem_model_id.is_some()),
            ("intent_model_id", self.intent_model_id.is_some()),
            ("tts_voice_id", self.tts_voice_id.is_some()),
            ("system_prompt", self.system_prompt.is_some()),
            ("summary_memory", self.summary_memory.is_some()),
            ("chat_history_mode", self.chat_history_mode.is_some()),
            ("lang_code", self.lang_code.is_some()),
            ("language", self.language.is_some()),
            ("sort", self.sort.is_some()),
        ];
        flags.into_iter().filter(|(_, set)| *set).map(|(name, _)| name).collect()
    }

    /// Produces a new record with every set field of the patch applied to `base`.
    pub fn apply(&self, base: &AgentRecord) -> AgentRecord {
        let mut next = base.clone();
        overwrite(&mut next.agent_name, &self.agent_name);
        overwrite_opt(&mut next.agent_code, &self.agent_code);
        overwrite_opt(&mut next.asr_model_id, &self.asr_model_id);
        overwrite_opt(&mut next.vad_model_id, &self.vad_model_id);
        overwrite_opt(&mut next.llm_model_id, &self.llm_model_id);
        overwrite_opt(&mut next.vllm_model_id, &self.vllm_model_id);
        overwrite_opt(&mut next.tts_model_id, &self.tts_model_id);
        overwrite_opt(&mut next.mem_model_id, &self.mem_model_id);
        overwrite_opt(&mut next.intent_model_id, &self.intent_model_id);
        overwrite_opt(&mut next.tts_voice_id, &self.tts_voice_id);
        overwrite_opt(&mut next.system_prompt, &self.system_prompt);
        overwrite_opt(&mut next.summary_memory, &self.summary_memory);
        overwrite_opt(&mut next.chat_history_mode, &self.chat_history_mode);
        overwrite_opt(&mut next.lang_code, &self.lang_code);
        overwrite_opt(&mut next.language, &self.language);
        overwrite(&mut next.sort, &self.sort);
        next
    }
}

fn overwrite<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn overwrite_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Input for creating a user-owned agent; everything else comes from the default template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCreate {
    pub agent_name: String,
    pub agent_code: Option<String>,
}
