use std::sync::Arc;

use voicedesk_core::domain::user::UserId;
use voicedesk_db::cache::{keys, CacheAside};
use voicedesk_db::repositories::UserRepository;

use crate::errors::ServiceError;

/// Username lookups for display, cached briefly.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    cache: CacheAside,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, cache: CacheAside) -> Self {
        Self { users, cache }
    }

    pub async fn username(&self, id: UserId) -> Result<Option<String>, ServiceError> {
        let users = &self.users;
        self.cache
            .get_or_load(&keys::user_name(id), keys::USER_NAME_TTL, move || async move {
                let user = users.find_by_id(id).await?;
                Ok::<_, ServiceError>(user.map(|user| user.username))
            })
            .await
    }
}
