//! Sample records for tests and local dry runs.
//!
//! Model ids match the catalog seeded by `0002_seed_catalog.sql`, so records
//! built here satisfy lookups against a freshly migrated database.

use chrono::{DateTime, TimeZone, Utc};

use voicedesk_core::domain::agent::{AgentId, AgentRecord, ChatHistoryMode};
use voicedesk_core::domain::model::{ModelCategory, ModelConfig, ModelId};
use voicedesk_core::domain::template::{AgentTemplate, TemplateId};
use voicedesk_core::domain::timbre::{Timbre, TimbreId};
use voicedesk_core::domain::user::{User, UserId};

pub const SAMPLE_PROMPT: &str = "You are a helpful assistant.";

pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 8, 30, 0).single().unwrap_or_else(Utc::now)
}

pub fn sample_agent(id: &str) -> AgentRecord {
    let at = fixed_timestamp();
    AgentRecord {
        id: AgentId(id.to_string()),
        agent_code: Some(format!("CODE_{}", id.to_ascii_uppercase())),
        agent_name: format!("Agent {id}"),
        owner: None,
        asr_model_id: Some(ModelId::new("ASR_FunASR")),
        vad_model_id: Some(ModelId::new("VAD_SileroVAD")),
        llm_model_id: Some(ModelId::new("LLM_ChatGLMLLM")),
        vllm_model_id: Some(ModelId::new("VLLM_ChatGLMVLLM")),
        tts_model_id: Some(ModelId::new("TTS_EdgeTTS")),
        mem_model_id: Some(ModelId::new("Memory_nomem")),
        intent_model_id: Some(ModelId::new("Intent_function_call")),
        tts_voice_id: None,
        system_prompt: Some(SAMPLE_PROMPT.to_string()),
        summary_memory: None,
        chat_history_mode: Some(ChatHistoryMode::None),
        lang_code: Some("en".to_string()),
        language: Some("English".to_string()),
        sort: 0,
        creator: None,
        created_at: at,
        updater: None,
        updated_at: at,
    }
}

pub fn sample_template() -> AgentTemplate {
    AgentTemplate {
        id: TemplateId("default_template".to_string()),
        agent_name: "Assistant".to_string(),
        asr_model_id: Some(ModelId::new("ASR_FunASR")),
        vad_model_id: Some(ModelId::new("VAD_SileroVAD")),
        llm_model_id: Some(ModelId::new("LLM_ChatGLMLLM")),
        vllm_model_id: Some(ModelId::new("VLLM_ChatGLMVLLM")),
        tts_model_id: Some(ModelId::new("TTS_EdgeTTS")),
        mem_model_id: Some(ModelId::new("Memory_nomem")),
        intent_model_id: Some(ModelId::new("Intent_function_call")),
        tts_voice_id: None,
        system_prompt: Some(SAMPLE_PROMPT.to_string()),
        summary_memory: None,
        chat_history_mode: Some(ChatHistoryMode::None),
        lang_code: Some("en".to_string()),
        language: Some("English".to_string()),
        is_default: true,
        sort: 0,
    }
}

pub fn sample_user(id: i64, username: &str) -> User {
    let at = fixed_timestamp();
    User {
        id: UserId(id),
        username: username.to_string(),
        super_admin: false,
        enabled: true,
        created_at: at,
        updated_at: at,
    }
}

pub fn sample_timbre(id: &str, name: &str) -> Timbre {
    let at = fixed_timestamp();
    Timbre {
        id: TimbreId(id.to_string()),
        tts_model_id: ModelId::new("TTS_EdgeTTS"),
        name: name.to_string(),
        voice_code: format!("en-US-{name}Neural"),
        languages: Some("English".to_string()),
        voice_demo: None,
        remark: None,
        sort: 1,
        created_at: at,
        updated_at: at,
    }
}

/// Catalog row named by the `{CATEGORY}_{name}` convention.
pub fn sample_model(category: ModelCategory, module_name: &str, sort: i32) -> ModelConfig {
    let at = fixed_timestamp();
    ModelConfig {
        id: category.conventional_id(module_name),
        category,
        model_code: module_name.to_string(),
        model_name: module_name.to_string(),
        is_enabled: true,
        is_default: false,
        config_json: serde_json::json!({ "type": module_name.to_ascii_lowercase() }),
        sort,
        created_at: at,
        updated_at: at,
    }
}
