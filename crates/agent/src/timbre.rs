use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use voicedesk_core::domain::timbre::{Timbre, TimbreData, TimbreId};
use voicedesk_core::errors::DomainError;
use voicedesk_db::cache::{keys, CacheAside};
use voicedesk_db::repositories::TimbreRepository;

use crate::errors::ServiceError;

/// Voice lookups served through the cache; entries live until the voice is edited.
#[derive(Clone)]
pub struct TimbreService {
    timbres: Arc<dyn TimbreRepository>,
    cache: CacheAside,
}

impl TimbreService {
    pub fn new(timbres: Arc<dyn TimbreRepository>, cache: CacheAside) -> Self {
        Self { timbres, cache }
    }

    /// Display name of a voice. Unknown voices and blank names are not cached.
    pub async fn name_by_id(&self, id: &TimbreId) -> Result<Option<String>, ServiceError> {
        let timbres = &self.timbres;
        let name = self
            .cache
            .get_or_load(&keys::timbre_name(id), keys::TIMBRE_TTL, move || async move {
                let timbre = timbres.find_by_id(id).await?;
                Ok::<_, ServiceError>(
                    timbre.map(|timbre| timbre.name).filter(|name| !name.trim().is_empty()),
                )
            })
            .await?;
        Ok(name)
    }

    pub async fn details(&self, id: &TimbreId) -> Result<Option<Timbre>, ServiceError> {
        let timbres = &self.timbres;
        self.cache
            .get_or_load(&keys::timbre_details(id), keys::TIMBRE_TTL, move || async move {
                timbres.find_by_id(id).await.map_err(ServiceError::from)
            })
            .await
    }

    /// Overwrites the editable fields and drops both cached views of the voice.
    pub async fn update(&self, id: &TimbreId, data: TimbreData) -> Result<Timbre, ServiceError> {
        let current = self
            .timbres
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::TimbreNotFound(id.clone()))?;

        let next = Timbre {
            id: current.id,
            tts_model_id: data.tts_model_id,
            name: data.name,
            voice_code: data.voice_code,
            languages: data.languages,
            voice_demo: data.voice_demo,
            remark: data.remark,
            sort: data.sort,
            created_at: current.created_at,
            updated_at: Utc::now(),
        };
        if !self.timbres.update(next.clone()).await? {
            return Err(DomainError::TimbreNotFound(id.clone()).into());
        }

        self.cache.invalidate(&keys::timbre_details(id)).await;
        self.cache.invalidate(&keys::timbre_name(id)).await;
        info!(
            event_name = "timbre.updated",
            correlation_id = %id.0,
            timbre_id = %id.0,
            "timbre updated; cache entries invalidated"
        );
        Ok(next)
    }
}
