use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Catalog id of the memory module that disables memory entirely.
pub const MEMORY_NO_MEM: &str = "Memory_nomem";

/// Intent module that relies on native function calling of the LLM.
pub const INTENT_FUNCTION_CALL: &str = "Intent_function_call";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_no_memory(&self) -> bool {
        self.0 == MEMORY_NO_MEM
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelCategory {
    Asr,
    Vad,
    Llm,
    Vllm,
    Tts,
    Memory,
    Intent,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 7] = [
        ModelCategory::Asr,
        ModelCategory::Vad,
        ModelCategory::Llm,
        ModelCategory::Vllm,
        ModelCategory::Tts,
        ModelCategory::Memory,
        ModelCategory::Intent,
    ];

    /// Name used by the catalog and by the `selected_module` document keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asr => "ASR",
            Self::Vad => "VAD",
            Self::Llm => "LLM",
            Self::Vllm => "VLLM",
            Self::Tts => "TTS",
            Self::Memory => "Memory",
            Self::Intent => "Intent",
        }
    }

    /// Module name assumed when the configuration document does not select one.
    pub fn default_module(self) -> &'static str {
        match self {
            Self::Asr => "FunASR",
            Self::Vad => "SileroVAD",
            Self::Llm => "ChatGLMLLM",
            Self::Vllm => "ChatGLMVLLM",
            Self::Tts => "EdgeTTS",
            Self::Memory => "nomem",
            Self::Intent => "function_call",
        }
    }

    /// Catalog id built by the `{CATEGORY}_{name}` convention.
    pub fn conventional_id(self, module_name: &str) -> ModelId {
        ModelId(format!("{}_{}", self.as_str(), module_name))
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            DomainError::InvariantViolation(format!("unknown model category `{value}`"))
        })
    }
}

/// Catalog entry for a configurable model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: ModelId,
    pub category: ModelCategory,
    pub model_code: String,
    pub model_name: String,
    pub is_enabled: bool,
    pub is_default: bool,
    pub config_json: serde_json::Value,
    pub sort: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelConfig {
    /// Provider family from `config_json.type`, e.g. `openai`.
    pub fn provider_type(&self) -> Option<&str> {
        self.config_json.get("type").and_then(|value| value.as_str())
    }

    /// Voice code a TTS model is configured with: `voice`, else `speaker`. Blank values count
    /// as unset.
    pub fn configured_voice(&self) -> Option<&str> {
        ["voice", "speaker"]
            .into_iter()
            .filter_map(|key| self.config_json.get(key).and_then(|value| value.as_str()))
            .map(str::trim)
            .find(|voice| !voice.is_empty())
    }
}

/// Slim projection returned by catalog code-list lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBasicInfo {
    pub id: ModelId,
    pub model_name: String,
}
