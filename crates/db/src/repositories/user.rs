use sqlx::Row;

use voicedesk_core::domain::user::{User, UserId};

use super::{parse_rfc3339, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let super_admin: i64 = row.try_get("super_admin")?;
    let status: i64 = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        super_admin: super_admin != 0,
        enabled: status != 0,
        created_at: parse_rfc3339("created_at", &created_at)?,
        updated_at: parse_rfc3339("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, super_admin, status, created_at, updated_at
             FROM sys_user WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO sys_user (id, username, super_admin, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 super_admin = excluded.super_admin,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(i64::from(user.super_admin))
        .bind(i64::from(user.enabled))
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("username `{}` is already taken", user.username)),
            ),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use voicedesk_core::domain::user::UserId;

    use super::SqlUserRepository;
    use crate::connect_migrated_in_memory;
    use crate::fixtures::sample_user;
    use crate::repositories::{RepositoryError, UserRepository};

    #[tokio::test]
    async fn save_and_find_user() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlUserRepository::new(pool);
        let user = sample_user(7, "operator");

        repo.save(user.clone()).await.expect("save");

        assert_eq!(repo.find_by_id(UserId(7)).await.expect("find"), Some(user));
        assert!(repo.find_by_id(UserId(8)).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn taken_username_is_a_conflict() {
        let pool = connect_migrated_in_memory().await.expect("pool");
        let repo = SqlUserRepository::new(pool);
        repo.save(sample_user(1, "operator")).await.expect("save first");

        let error = repo.save(sample_user(2, "operator")).await.expect_err("duplicate username");

        assert!(matches!(error, RepositoryError::Conflict(_)));
    }
}
