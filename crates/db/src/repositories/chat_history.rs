use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};

use voicedesk_core::domain::agent::AgentId;

use super::{parse_rfc3339, ChatHistoryRepository, RepositoryError};
use crate::DbPool;

/// One recorded utterance; `chat_type` is 1 for the user and 2 for the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    pub id: Option<i64>,
    pub agent_id: AgentId,
    pub session_id: String,
    pub chat_type: i32,
    pub content: Option<String>,
    pub audio_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What to drop when an agent's history is purged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatHistoryPurge {
    /// Remove every row of the agent.
    All,
    /// Keep the text, detach the recorded audio.
    AudioOnly,
}

pub struct SqlChatHistoryRepository {
    pool: DbPool,
}

impl SqlChatHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<ChatHistoryEntry, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;

    Ok(ChatHistoryEntry {
        id: row.try_get("id")?,
        agent_id: AgentId(row.try_get("agent_id")?),
        session_id: row.try_get("session_id")?,
        chat_type: row.try_get("chat_type")?,
        content: row.try_get("content")?,
        audio_id: row.try_get("audio_id")?,
        created_at: parse_rfc3339("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ChatHistoryRepository for SqlChatHistoryRepository {
    async fn append(&self, entry: ChatHistoryEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO ai_agent_chat_history (agent_id, session_id, chat_type, content,
                                                audio_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.agent_id.0)
        .bind(&entry.session_id)
        .bind(entry.chat_type)
        .bind(&entry.content)
        .bind(&entry.audio_id)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_agent(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatHistoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, agent_id, session_id, chat_type, content, audio_id, created_at
             FROM ai_agent_chat_history WHERE agent_id = ? ORDER BY id ASC",
        )
        .bind(&agent_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn purge_by_agent(
        &self,
        agent_id: &AgentId,
        purge: ChatHistoryPurge,
    ) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        purge_history(&mut *conn, agent_id, purge).await
    }
}

pub(crate) async fn purge_history(
    conn: &mut SqliteConnection,
    agent_id: &AgentId,
    purge: ChatHistoryPurge,
) -> Result<u64, RepositoryError> {
    let statement = match purge {
        ChatHistoryPurge::All => "DELETE FROM ai_agent_chat_history WHERE agent_id = ?",
        ChatHistoryPurge::AudioOnly => {
            "UPDATE ai_agent_chat_history SET audio_id = NULL
             WHERE agent_id = ? AND audio_id IS NOT NULL"
        }
    };
    let result = sqlx::query(statement).bind(&agent_id.0).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
