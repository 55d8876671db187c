use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::ModelId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimbreId(pub String);

/// A selectable voice of a TTS model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timbre {
    pub id: TimbreId,
    pub tts_model_id: ModelId,
    pub name: String,
    pub voice_code: String,
    pub languages: Option<String>,
    pub voice_demo: Option<String>,
    pub remark: Option<String>,
    pub sort: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable part of a [`Timbre`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimbreData {
    pub tts_model_id: ModelId,
    pub name: String,
    pub voice_code: String,
    pub languages: Option<String>,
    pub voice_demo: Option<String>,
    pub remark: Option<String>,
    pub sort: i32,
}
