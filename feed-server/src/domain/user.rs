use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use super::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

impl RegisterRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let username = normalize_username(&self.username)?;
        let email = normalize_email(&self.email)?;
        let password_len = self.password.chars().count();
        if password_len < 8 || password_len > 128 {
            return Err(DomainError::Validation {
                field: "password",
                message: "must be 8..128 chars",
            });
        }
        Ok(Self {
            username,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl LoginRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let username = self.username.trim();
        if username.is_empty() || username.len() > 64 {
            return Err(DomainError::Validation {
                field: "username",
                message: "must be 1..64 chars",
            });
        }

        if self.password.is_empty() {
            return Err(DomainError::Validation {
                field: "password",
                message: "must not be empty",
            });
        }
        Ok(Self {
            username: username.to_lowercase(),
            password: self.password,
        })
    }
}

/// Профиль — это тот же документ, что и учётная запись: создаётся при
/// регистрации, поэтому «ленивое создание при первом чтении» не нужно.
#[derive(Debug, Clone)]
pub(crate) struct Profile {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) display_name: Option<String>,
    pub(crate) bio: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) posts_count: i64,
    pub(crate) followers: i64,
    pub(crate) following: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: i64,
        username: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
        bio: impl Into<String>,
        avatar_url: Option<String>,
        posts_count: i64,
        followers: i64,
        following: i64,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if id <= 0 {
            return Err(DomainError::Validation {
                field: "id",
                message: "must be > 0",
            });
        }
        let username = normalize_username(&username.into())?;
        let email = normalize_email(&email.into())?;
        let bio = bio.into();

        Ok(Self {
            id,
            username,
            email,
            display_name,
            bio,
            avatar_url,
            posts_count,
            followers,
            following,
            created_at,
            updated_at,
        })
    }
}

/// Частичное обновление профиля: отсутствующее поле остаётся как было
/// (merge-семантика).
#[derive(Debug, Clone, Default)]
pub(crate) struct ProfilePatchRequest {
    pub(crate) username: Option<String>,
    pub(crate) display_name: Option<String>,
    pub(crate) bio: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

impl ProfilePatchRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let username = self
            .username
            .map(|username| normalize_username(&username))
            .transpose()?;
        let display_name = self
            .display_name
            .map(|name| normalize_display_name(&name))
            .transpose()?;
        let bio = self.bio.map(|bio| normalize_bio(&bio)).transpose()?;
        let avatar_url = self
            .avatar_url
            .map(|url| normalize_avatar_url(&url))
            .transpose()?;

        Ok(Self {
            username,
            display_name,
            bio,
            avatar_url,
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }
}

fn normalize_username(username: &str) -> Result<String, DomainError> {
    let username = username.trim().to_lowercase();
    if username.len() < 3 || username.len() > 64 {
        return Err(DomainError::Validation {
            field: "username",
            message: "must be 3..64 chars",
        });
    }
    Ok(username)
}

fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(DomainError::Validation {
            field: "email",
            message: "must be a valid email",
        });
    }
    Ok(email)
}

fn normalize_display_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 64 {
        return Err(DomainError::Validation {
            field: "display_name",
            message: "must be 1..64 chars",
        });
    }
    Ok(name.to_string())
}

fn normalize_bio(bio: &str) -> Result<String, DomainError> {
    let bio = bio.trim();
    if bio.chars().count() > 150 {
        return Err(DomainError::Validation {
            field: "bio",
            message: "must be at most 150 chars",
        });
    }
    Ok(bio.to_string())
}

fn normalize_avatar_url(url: &str) -> Result<String, DomainError> {
    let url = url.trim();
    if url.is_empty() || url.len() > 2048 {
        return Err(DomainError::Validation {
            field: "avatar_url",
            message: "must be 1..2048 chars",
        });
    }
    Ok(url.to_string())
}
