use thiserror::Error;

use voicedesk_core::domain::agent::AgentId;
use voicedesk_core::errors::{ApplicationError, DomainError};
use voicedesk_db::RepositoryError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("repository failure: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Domain(error) => Self::Domain(error),
            ServiceError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

/// Failure inside one default-agent reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to load default agent state: {0}")]
    Load(#[source] RepositoryError),
    #[error("failed to persist default agent: {0}")]
    Persist(#[source] RepositoryError),
    #[error("failed to seed plugins for agent {agent_id}: {source}")]
    SeedPlugins {
        agent_id: AgentId,
        #[source]
        source: RepositoryError,
    },
}
