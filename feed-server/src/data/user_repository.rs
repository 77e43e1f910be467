use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::user::Profile;

#[derive(Debug, Clone)]
pub(crate) struct UserCredentials {
    pub(crate) profile: Profile,
    pub(crate) password_hash: String,
}

#[derive(Debug, Clone)]
pub(crate) struct NewUser {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
}

/// Merge-патч профиля: `None` — поле не трогаем.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProfilePatch {
    pub(crate) username: Option<String>,
    pub(crate) display_name: Option<String>,
    pub(crate) bio: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

#[async_trait]
pub(crate) trait UserRepository: Send + Sync {
    async fn create_user(&self, input: NewUser) -> Result<Profile, DomainError>;
    async fn find_by_username(&self, username: &str)
    -> Result<Option<UserCredentials>, DomainError>;
    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, DomainError>;
    async fn update_profile(
        &self,
        user_id: i64,
        patch: ProfilePatch,
    ) -> Result<Option<Profile>, DomainError>;
}
