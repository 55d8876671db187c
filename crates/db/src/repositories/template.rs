use sqlx::Row;

use voicedesk_core::domain::template::{AgentTemplate, TemplateId};

use super::agent::{decode_history_mode, model_id};
use super::{RepositoryError, TemplateRepository};
use crate::DbPool;

pub struct SqlTemplateRepository {
    pool: DbPool,
}

impl SqlTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<AgentTemplate, RepositoryError> {
    let is_default: i64 = row.try_get("is_default")?;

    Ok(AgentTemplate {
        id: TemplateId(row.try_get("id")?),
        agent_name: row.try_get("agent_name")?,
        asr_model_id: model_id(row, "asr_model_id")?,
        vad_model_id: model_id(row, "vad_model_id")?,
        llm_model_id: model_id(row, "llm_model_id")?,
        vllm_model_id: model_id(row, "vllm_model_id")?,
        tts_model_id: model_id(row, "tts_model_id")?,
        mem_model_id: model_id(row, "mem_model_id")?,
        intent_model_id: model_id(row, "intent_model_id")?,
        tts_voice_id: row.try_get("tts_voice_id")?,
        system_prompt: row.try_get("system_prompt")?,
        summary_memory: row.try_get("summary_memory")?,
        chat_history_mode: decode_history_mode(row.try_get("chat_history_conf")?),
        lang_code: row.try_get("lang_code")?,
        language: row.try_get("language")?,
        is_default: is_default != 0,
        sort: row.try_get("sort")?,
    })
}

#[async_trait::async_trait]
impl TemplateRepository for SqlTemplateRepository {
    async fn default_template(&self) -> Result<Option<AgentTemplate>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agent_name, asr_model_id, vad_model_id, llm_model_id, vllm_model_id,
                    tts_model_id, mem_model_id, intent_model_id, tts_voice_id, system_prompt,
                    summary_memory, chat_history_conf, lang_code, language, is_default, sort
             FROM ai_agent_template
             ORDER BY is_default DESC, sort ASC, id ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_template).transpose()
    }
}

#[cfg(test)]
mod tests {
    use voicedesk_core::domain::agent::ChatHistoryMode;
    use voicedesk_core::domain::model::ModelId;

    use super::SqlTemplateRepository;
    use crate::repositories::TemplateRepository;
    use crate::{connect_migrated_in_memory, connect_with_settings};

    #[tokio::test]
    async fn seeded_template_is_returned_as_default() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlTemplateRepository::new(pool);

        let template = repo.default_template().await.expect("query").expect("seeded template");

        assert!(template.is_default);
        assert_eq!(template.mem_model_id, Some(ModelId::new("Memory_nomem")));
        assert_eq!(template.llm_model_id, Some(ModelId::new("LLM_ChatGLMLLM")));
        assert_eq!(template.chat_history_mode, Some(ChatHistoryMode::None));
    }

    #[tokio::test]
    async fn flagged_template_wins_over_lower_sort() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        sqlx::query(
            "INSERT INTO ai_agent_template (id, agent_name, is_default, sort)
             VALUES ('early', 'Early', 0, -10)",
        )
        .execute(&pool)
        .await
        .expect("insert template");
        let repo = SqlTemplateRepository::new(pool);

        let template = repo.default_template().await.expect("query").expect("template");

        assert_eq!(template.id.0, "default_template");
    }

    #[tokio::test]
    async fn empty_template_table_yields_none() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        crate::migrations::run_pending(&pool).await.expect("migrate");
        sqlx::query("DELETE FROM ai_agent_template").execute(&pool).await.expect("clear");
        let repo = SqlTemplateRepository::new(pool);

        assert!(repo.default_template().await.expect("query").is_none());
    }
}
