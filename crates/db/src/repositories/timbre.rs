use sqlx::Row;

use voicedesk_core::domain::model::ModelId;
use voicedesk_core::domain::timbre::{Timbre, TimbreId};

use super::{parse_rfc3339, RepositoryError, TimbreRepository};
use crate::DbPool;

const TIMBRE_COLUMNS: &str =
    "id, tts_model_id, name, tts_voice, languages, voice_demo, remark, sort, created_at, updated_at";

pub struct SqlTimbreRepository {
    pool: DbPool,
}

impl SqlTimbreRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_timbre(row: &sqlx::sqlite::SqliteRow) -> Result<Timbre, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Timbre {
        id: TimbreId(row.try_get("id")?),
        tts_model_id: ModelId(row.try_get("tts_model_id")?),
        name: row.try_get("name")?,
        voice_code: row.try_get("tts_voice")?,
        languages: row.try_get("languages")?,
        voice_demo: row.try_get("voice_demo")?,
        remark: row.try_get("remark")?,
        sort: row.try_get("sort")?,
        created_at: parse_rfc3339("created_at", &created_at)?,
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl TimbreRepository for SqlTimbreRepository {
    async fn find_by_id(&self, id: &TimbreId) -> Result<Option<Timbre>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TIMBRE_COLUMNS} FROM ai_tts_voice WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_timbre).transpose()
    }

    async fn find_by_voice_code(
        &self,
        tts_model_id: &ModelId,
        voice_code: &str,
    ) -> Result<Option<Timbre>, RepositoryError> {
        if voice_code.trim().is_empty() {
            return Ok(None);
        }
        let row = sqlx::query(&format!(
            "SELECT {TIMBRE_COLUMNS} FROM ai_tts_voice
             WHERE tts_model_id = ? AND tts_voice = ?
             ORDER BY sort ASC, id ASC LIMIT 1"
        ))
        .bind(tts_model_id.as_str())
        .bind(voice_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_timbre).transpose()
    }

    async fn insert(&self, timbre: Timbre) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO ai_tts_voice (id, tts_model_id, name, tts_voice, languages, voice_demo,
                                       remark, sort, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&timbre.id.0)
        .bind(timbre.tts_model_id.as_str())
        .bind(&timbre.name)
        .bind(&timbre.voice_code)
        .bind(&timbre.languages)
        .bind(&timbre.voice_demo)
        .bind(&timbre.remark)
        .bind(timbre.sort)
        .bind(timbre.created_at.to_rfc3339())
        .bind(timbre.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::Conflict(format!("timbre `{}` already exists", timbre.id.0)))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, timbre: Timbre) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE ai_tts_voice SET
                 tts_model_id = ?, name = ?, tts_voice = ?, languages = ?, voice_demo = ?,
                 remark = ?, sort = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(timbre.tts_model_id.as_str())
        .bind(&timbre.name)
        .bind(&timbre.voice_code)
        .bind(&timbre.languages)
        .bind(&timbre.voice_demo)
        .bind(&timbre.remark)
        .bind(timbre.sort)
        .bind(timbre.updated_at.to_rfc3339())
        .bind(&timbre.id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use voicedesk_core::domain::model::ModelId;
    use voicedesk_core::domain::timbre::TimbreId;

    use super::SqlTimbreRepository;
    use crate::connect_migrated_in_memory;
    use crate::fixtures::sample_timbre;
    use crate::repositories::TimbreRepository;

    #[tokio::test]
    async fn insert_find_and_update_timbre() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlTimbreRepository::new(pool);
        let timbre = sample_timbre("t-1", "Aria");

        repo.insert(timbre.clone()).await.expect("insert");
        assert_eq!(repo.find_by_id(&timbre.id).await.expect("find"), Some(timbre.clone()));

        let mut renamed = timbre.clone();
        renamed.name = "Aria (warm)".to_string();
        renamed.remark = Some("studio take".to_string());
        assert!(repo.update(renamed.clone()).await.expect("update"));

        let found = repo.find_by_id(&timbre.id).await.expect("find").expect("exists");
        assert_eq!(found.name, "Aria (warm)");
        assert_eq!(found.remark.as_deref(), Some("studio take"));
    }

    #[tokio::test]
    async fn update_of_unknown_timbre_reports_false() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlTimbreRepository::new(pool);

        let updated = repo.update(sample_timbre("ghost", "Nobody")).await.expect("update");

        assert!(!updated);
        assert!(repo.find_by_id(&TimbreId("ghost".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn voice_code_lookup_is_scoped_to_the_tts_model() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlTimbreRepository::new(pool);
        let mut coqui = sample_timbre("t-coqui", "Jenny");
        coqui.tts_model_id = ModelId::new("TTS_CoquiTTS");
        repo.insert(sample_timbre("t-edge", "Jenny")).await.expect("insert edge");
        repo.insert(coqui).await.expect("insert coqui");

        let found = repo
            .find_by_voice_code(&ModelId::new("TTS_CoquiTTS"), "en-US-JennyNeural")
            .await
            .expect("lookup")
            .expect("coqui voice");
        let blank = repo.find_by_voice_code(&ModelId::new("TTS_EdgeTTS"), " ").await.expect("lookup");

        assert_eq!(found.id, TimbreId("t-coqui".to_string()));
        assert!(blank.is_none());
    }

    #[tokio::test]
    async fn seeded_catalog_carries_the_default_edge_voice() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlTimbreRepository::new(pool);

        let aria = repo
            .find_by_voice_code(&ModelId::new("TTS_EdgeTTS"), "en-US-AriaNeural")
            .await
            .expect("lookup");

        assert!(aria.is_some_and(|timbre| timbre.name == "Aria"));
    }
}
