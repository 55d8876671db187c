use thiserror::Error;

use crate::domain::agent::AgentId;
use crate::domain::model::ModelId;
use crate::domain::timbre::TimbreId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("agent `{0}` was not found")]
    AgentNotFound(AgentId),
    #[error("timbre `{0:?}` was not found")]
    TimbreNotFound(TimbreId),
    #[error("intent model {intent} cannot be combined with llm {llm}")]
    LlmIntentMismatch { llm: ModelId, intent: ModelId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("cache failure: {0}")]
    Cache(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}
