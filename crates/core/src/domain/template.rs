use serde::{Deserialize, Serialize};

use crate::domain::agent::ChatHistoryMode;
use crate::domain::model::{ModelCategory, ModelId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// Out-of-the-box agent settings new agents start from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: TemplateId,
    pub agent_name: String,
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
    pub is_default: bool,
    pub sort: i32,
}

impl AgentTemplate {
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
}
