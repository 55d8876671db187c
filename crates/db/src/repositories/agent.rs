use sqlx::{Row, SqliteConnection};

use voicedesk_core::domain::agent::{AgentId, AgentRecord, ChatHistoryMode};
use voicedesk_core::domain::model::ModelId;
use voicedesk_core::domain::user::UserId;

use super::{parse_rfc3339, AgentRepository, RepositoryError};
use crate::DbPool;

const AGENT_COLUMNS: &str = "id, user_id, agent_code, agent_name, asr_model_id, vad_model_id,
    llm_model_id, vllm_model_id, tts_model_id, mem_model_id, intent_model_id, tts_voice_id,
    system_prompt, summary_memory, chat_history_conf, lang_code, language, sort, creator,
    created_at, updater, updated_at";

pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn decode_history_mode(value: Option<i64>) -> Option<ChatHistoryMode> {
    value.map(ChatHistoryMode::from_i64)
}

pub(crate) fn model_id(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Option<ModelId>, RepositoryError> {
    let value: Option<String> = row.try_get(column)?;
    Ok(value.map(ModelId))
}

fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> Result<AgentRecord, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let owner: Option<i64> = row.try_get("user_id")?;
    let creator: Option<i64> = row.try_get("creator")?;
    let updater: Option<i64> = row.try_get("updater")?;

    Ok(AgentRecord {
        id: AgentId(row.try_get("id")?),
        agent_code: row.try_get("agent_code")?,
        agent_name: row.try_get("agent_name")?,
        owner: owner.map(UserId),
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
        sort: row.try_get("sort")?,
        creator: creator.map(UserId),
        created_at: parse_rfc3339("created_at", &created_at)?,
        updater: updater.map(UserId),
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}

fn model_column(id: &Option<ModelId>) -> Option<&str> {
    id.as_ref().map(ModelId::as_str)
}

#[async_trait::async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<AgentRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM ai_agent WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn insert(&self, agent: AgentRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_agent(&mut *conn, &agent).await
    }

    async fn update(&self, agent: AgentRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        update_agent(&mut *conn, &agent).await
    }

    async fn device_count(&self, id: &AgentId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_device WHERE agent_id = ?")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub(crate) async fn insert_agent(
    conn: &mut SqliteConnection,
    agent: &AgentRecord,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO ai_agent (id, user_id, agent_code, agent_name, asr_model_id, vad_model_id,
                               llm_model_id, vllm_model_id, tts_model_id, mem_model_id,
                               intent_model_id, tts_voice_id, system_prompt, summary_memory,
                               chat_history_conf, lang_code, language, sort, creator,
                               created_at, updater, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&agent.id.0)
    .bind(agent.owner.map(|owner| owner.0))
    .bind(&agent.agent_code)
    .bind(&agent.agent_name)
    .bind(model_column(&agent.asr_model_id))
    .bind(model_column(&agent.vad_model_id))
    .bind(model_column(&agent.llm_model_id))
    .bind(model_column(&agent.vllm_model_id))
    .bind(model_column(&agent.tts_model_id))
    .bind(model_column(&agent.mem_model_id))
    .bind(model_column(&agent.intent_model_id))
    .bind(&agent.tts_voice_id)
    .bind(&agent.system_prompt)
    .bind(&agent.summary_memory)
    .bind(agent.chat_history_mode.map(ChatHistoryMode::as_i64))
    .bind(&agent.lang_code)
    .bind(&agent.language)
    .bind(agent.sort)
    .bind(agent.creator.map(|user| user.0))
    .bind(agent.created_at.to_rfc3339())
    .bind(agent.updater.map(|user| user.0))
    .bind(agent.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(RepositoryError::Conflict(format!("agent `{}` already exists", agent.id)))
        }
        Err(error) => Err(error.into()),
    }
}

pub(crate) async fn update_agent(
    conn: &mut SqliteConnection,
    agent: &AgentRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE ai_agent SET
             user_id = ?, agent_code = ?, agent_name = ?, asr_model_id = ?, vad_model_id = ?,
             llm_model_id = ?, vllm_model_id = ?, tts_model_id = ?, mem_model_id = ?,
             intent_model_id = ?, tts_voice_id = ?, system_prompt = ?, summary_memory = ?,
             chat_history_conf = ?, lang_code = ?, language = ?, sort = ?,
             updater = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(agent.owner.map(|owner| owner.0))
    .bind(&agent.agent_code)
    .bind(&agent.agent_name)
    .bind(model_column(&agent.asr_model_id))
    .bind(model_column(&agent.vad_model_id))
    .bind(model_column(&agent.llm_model_id))
    .bind(model_column(&agent.vllm_model_id))
    .bind(model_column(&agent.tts_model_id))
    .bind(model_column(&agent.mem_model_id))
    .bind(model_column(&agent.intent_model_id))
    .bind(&agent.tts_voice_id)
    .bind(&agent.system_prompt)
    .bind(&agent.summary_memory)
    .bind(agent.chat_history_mode.map(ChatHistoryMode::as_i64))
    .bind(&agent.lang_code)
    .bind(&agent.language)
    .bind(agent.sort)
    .bind(agent.updater.map(|user| user.0))
    .bind(agent.updated_at.to_rfc3339())
    .bind(&agent.id.0)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
