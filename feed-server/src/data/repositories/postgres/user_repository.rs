use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::user_repository::{NewUser, ProfilePatch, UserCredentials, UserRepository};
use crate::domain::error::DomainError;
use crate::domain::user::Profile;

#[derive(Debug, Clone)]
pub(crate) struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    username: String,
    email: String,
    display_name: Option<String>,
    bio: String,
    avatar_url: Option<String>,
    posts_count: i64,
    followers: i64,
    following: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    profile: ProfileRow,
    password_hash: String,
}

const PROFILE_COLUMNS: &str = "id, username, email, display_name, bio, avatar_url, \
     posts_count, followers, following, created_at, updated_at";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, input: NewUser) -> Result<Profile, DomainError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        map_row_to_profile(row)
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS}, password_hash \
             FROM users \
             WHERE username = $1"
        );
        let row = sqlx::query_as::<_, CredentialsRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(|r| {
            Ok(UserCredentials {
                profile: map_row_to_profile(r.profile)?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, DomainError> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} \
             FROM users \
             WHERE id = $1"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(map_row_to_profile).transpose()
    }

    async fn update_profile(
        &self,
        user_id: i64,
        patch: ProfilePatch,
    ) -> Result<Option<Profile>, DomainError> {
        // COALESCE даёт merge-семантику: не переданные поля не меняются.
        let sql = format!(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 display_name = COALESCE($3, display_name), \
                 bio = COALESCE($4, bio), \
                 avatar_url = COALESCE($5, avatar_url), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(user_id)
            .bind(patch.username)
            .bind(patch.display_name)
            .bind(patch.bio)
            .bind(patch.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(map_row_to_profile).transpose()
    }
}

fn map_row_to_profile(row: ProfileRow) -> Result<Profile, DomainError> {
    Profile::new(
        row.id,
        row.username,
        row.email,
        row.display_name,
        row.bio,
        row.avatar_url,
        row.posts_count,
        row.followers,
        row.following,
        row.created_at,
        row.updated_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_user_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23505")
    {
        let resource = match db_err.constraint() {
            Some("users_username_key") => "username",
            Some("users_email_key") => "email",
            _ => "user",
        };
        return DomainError::AlreadyExists(resource.to_string());
    }
    DomainError::Unexpected(err.to_string())
}
