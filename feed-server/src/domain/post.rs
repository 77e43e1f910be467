use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

const MAX_TEXT_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Post {
    pub(crate) id: i64,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_avatar_url: Option<String>,
    pub(crate) text: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) like_count: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Post {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: i64,
        author_id: i64,
        author_username: impl Into<String>,
        author_avatar_url: Option<String>,
        text: Option<String>,
        image_url: Option<String>,
        like_count: i64,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        validate_positive_i64("id", id)?;
        validate_positive_i64("author_id", author_id)?;

        if text.is_none() && image_url.is_none() {
            return Err(DomainError::Validation {
                field: "post",
                message: "text or image required",
            });
        }
        if like_count < 0 {
            return Err(DomainError::Validation {
                field: "like_count",
                message: "must be >= 0",
            });
        }
        if let Some(updated_at) = updated_at
            && updated_at < created_at
        {
            return Err(DomainError::Validation {
                field: "updated_at",
                message: "must be >= created_at",
            });
        }

        Ok(Self {
            id,
            author_id,
            author_username: author_username.into(),
            author_avatar_url,
            text,
            image_url,
            like_count,
            created_at,
            updated_at,
        })
    }
}

/// Пост в ленте глазами конкретного пользователя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FeedPost {
    #[serde(flatten)]
    pub(crate) post: Post,
    pub(crate) liked_by_viewer: bool,
}

/// Один доставленный снапшот ленты. Самодостаточен: порядок — от новых к
/// старым, лайки уже посчитаны на стороне записи.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FeedSnapshot {
    pub(crate) posts: Vec<FeedPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CreatePostRequest {
    pub(crate) text: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) idempotency_key: Option<String>,
}

impl CreatePostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let text = normalize_optional_text(self.text)?;
        let image_url = normalize_optional_url(self.image_url)?;

        if text.is_none() && image_url.is_none() {
            return Err(DomainError::Validation {
                field: "post",
                message: "text or image required",
            });
        }

        let idempotency_key = self
            .idempotency_key
            .map(|key| {
                let key = key.trim().to_string();
                if key.is_empty() || key.len() > 128 {
                    return Err(DomainError::Validation {
                        field: "idempotency_key",
                        message: "must be 1..128 chars",
                    });
                }
                Ok(key)
            })
            .transpose()?;

        Ok(Self {
            text,
            image_url,
            idempotency_key,
        })
    }
}

/// Текст — единственное изменяемое поле поста; картинка после публикации
/// неизменна.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UpdatePostRequest {
    pub(crate) text: String,
}

impl UpdatePostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            text: normalize_text(&self.text)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct LikeOutcome {
    pub(crate) liked: bool,
    pub(crate) like_count: i64,
}

fn validate_positive_i64(field: &'static str, value: i64) -> Result<(), DomainError> {
    if value <= 0 {
        return Err(DomainError::Validation {
            field,
            message: "must be > 0",
        });
    }
    Ok(())
}

fn normalize_text(text: &str) -> Result<String, DomainError> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_TEXT_CHARS {
        return Err(DomainError::Validation {
            field: "text",
            message: "must be 1..4000 chars",
        });
    }
    Ok(text.to_string())
}

// Пустой после trim текст считается отсутствующим.
fn normalize_optional_text(text: Option<String>) -> Result<Option<String>, DomainError> {
    match text {
        None => Ok(None),
        Some(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if text.chars().count() > MAX_TEXT_CHARS {
                return Err(DomainError::Validation {
                    field: "text",
                    message: "must be 1..4000 chars",
                });
            }
            Ok(Some(text.to_string()))
        }
    }
}

fn normalize_optional_url(url: Option<String>) -> Result<Option<String>, DomainError> {
    match url {
        None => Ok(None),
        Some(url) => {
            let url = url.trim();
            if url.is_empty() {
                return Ok(None);
            }
            if url.len() > 2048 {
                return Err(DomainError::Validation {
                    field: "image_url",
                    message: "must be 1..2048 chars",
                });
            }
            Ok(Some(url.to_string()))
        }
    }
}
