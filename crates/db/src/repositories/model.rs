use sqlx::Row;

use voicedesk_core::domain::model::{ModelBasicInfo, ModelCategory, ModelConfig, ModelId};
use voicedesk_core::domain::plugin::{PluginField, PluginId, PluginProvider};

use super::{
    parse_json, parse_rfc3339, to_json, ModelConfigRepository, PluginProviderRepository,
    RepositoryError,
};
use crate::DbPool;

const PLUGIN_MODEL_TYPE: &str = "Plugin";

pub struct SqlModelConfigRepository {
    pool: DbPool,
}

impl SqlModelConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_model(row: &sqlx::sqlite::SqliteRow) -> Result<ModelConfig, RepositoryError> {
    let model_type: String = row.try_get("model_type")?;
    let category = ModelCategory::parse(&model_type)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown model_type '{model_type}'")))?;
    let is_enabled: i64 = row.try_get("is_enabled")?;
    let is_default: i64 = row.try_get("is_default")?;
    let config_json: String = row.try_get("config_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ModelConfig {
        id: ModelId(row.try_get("id")?),
        category,
        model_code: row.try_get("model_code")?,
        model_name: row.try_get("model_name")?,
        is_enabled: is_enabled != 0,
        is_default: is_default != 0,
        config_json: parse_json("config_json", &config_json)?,
        sort: row.try_get("sort")?,
        created_at: parse_rfc3339("created_at", &created_at)?,
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl ModelConfigRepository for SqlModelConfigRepository {
    async fn find_by_id(&self, id: &ModelId) -> Result<Option<ModelConfig>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, model_type, model_code, model_name, is_enabled, is_default, config_json,
                    sort, created_at, updated_at
             FROM ai_model_config WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_model).transpose()
    }

    async fn list_codes(
        &self,
        category: ModelCategory,
        name_query: Option<&str>,
    ) -> Result<Vec<ModelBasicInfo>, RepositoryError> {
        let pattern = name_query.map(|query| format!("%{}%", query.trim()));
        let rows = sqlx::query(
            "SELECT id, model_name FROM ai_model_config
             WHERE model_type = ? AND is_enabled = 1
               AND (? IS NULL OR model_name LIKE ?)
             ORDER BY sort ASC, id ASC",
        )
        .bind(category.as_str())
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ModelBasicInfo {
                    id: ModelId(row.try_get("id")?),
                    model_name: row.try_get("model_name")?,
                })
            })
            .collect()
    }

    async fn save(&self, model: ModelConfig) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO ai_model_config (id, model_type, model_code, model_name, is_enabled,
                                          is_default, config_json, sort, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 model_type = excluded.model_type,
                 model_code = excluded.model_code,
                 model_name = excluded.model_name,
                 is_enabled = excluded.is_enabled,
                 is_default = excluded.is_default,
                 config_json = excluded.config_json,
                 sort = excluded.sort,
                 updated_at = excluded.updated_at",
        )
        .bind(model.id.as_str())
        .bind(model.category.as_str())
        .bind(&model.model_code)
        .bind(&model.model_name)
        .bind(i64::from(model.is_enabled))
        .bind(i64::from(model.is_default))
        .bind(to_json("config_json", &model.config_json)?)
        .bind(model.sort)
        .bind(model.created_at.to_rfc3339())
        .bind(model.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlPluginProviderRepository {
    pool: DbPool,
}

impl SqlPluginProviderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_provider(row: &sqlx::sqlite::SqliteRow) -> Result<PluginProvider, RepositoryError> {
    let fields: String = row.try_get("fields")?;
    let fields: Vec<PluginField> = parse_json("fields", &fields)?;

    Ok(PluginProvider {
        id: PluginId(row.try_get("id")?),
        provider_code: row.try_get("provider_code")?,
        name: row.try_get("name")?,
        fields,
        sort: row.try_get("sort")?,
    })
}

#[async_trait::async_trait]
impl PluginProviderRepository for SqlPluginProviderRepository {
    async fn find_by_id(&self, id: &PluginId) -> Result<Option<PluginProvider>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, provider_code, name, fields, sort
             FROM ai_model_provider WHERE id = ? AND model_type = ?",
        )
        .bind(&id.0)
        .bind(PLUGIN_MODEL_TYPE)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_provider).transpose()
    }

    async fn save(&self, provider: PluginProvider) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO ai_model_provider (id, model_type, provider_code, name, fields, sort)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 provider_code = excluded.provider_code,
                 name = excluded.name,
                 fields = excluded.fields,
                 sort = excluded.sort",
        )
        .bind(&provider.id.0)
        .bind(PLUGIN_MODEL_TYPE)
        .bind(&provider.provider_code)
        .bind(&provider.name)
        .bind(to_json("fields", &provider.fields)?)
        .bind(provider.sort)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
