use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

const MAX_COMMENT_CHARS: usize = 1000;

/// Комментарии append-only: путей редактирования и удаления нет.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Comment {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_avatar_url: Option<String>,
    pub(crate) text: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn new(
        id: i64,
        post_id: i64,
        author_id: i64,
        author_username: impl Into<String>,
        author_avatar_url: Option<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if id <= 0 || post_id <= 0 || author_id <= 0 {
            return Err(DomainError::Validation {
                field: "id",
                message: "must be > 0",
            });
        }
        let text = normalize_comment_text(&text.into())?;

        Ok(Self {
            id,
            post_id,
            author_id,
            author_username: author_username.into(),
            author_avatar_url,
            text,
            created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AddCommentRequest {
    pub(crate) text: String,
}

impl AddCommentRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            text: normalize_comment_text(&self.text)?,
        })
    }
}

fn normalize_comment_text(text: &str) -> Result<String, DomainError> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_COMMENT_CHARS {
        return Err(DomainError::Validation {
            field: "text",
            message: "must be 1..1000 chars",
        });
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AddCommentRequest, Comment, DomainError};

    #[test]
    fn add_comment_request_rejects_empty_text() {
        let req = AddCommentRequest {
            text: "   ".to_string(),
        };

        let err = req.validate().expect_err("text must be rejected");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[test]
    fn add_comment_request_normalizes_text() {
        let req = AddCommentRequest {
            text: "  nice shot  ".to_string(),
        };

        let validated = req.validate().expect("must validate");
        assert_eq!(validated.text, "nice shot");
    }

    #[test]
    fn comment_new_builds_comment() {
        let comment = Comment::new(1, 2, 3, "bob", None, "  hi  ", Utc::now())
            .expect("comment should be created");

        assert_eq!(comment.post_id, 2);
        assert_eq!(comment.author_username, "bob");
        assert_eq!(comment.text, "hi");
    }

    #[test]
    fn comment_new_rejects_non_positive_ids() {
        assert!(Comment::new(0, 2, 3, "bob", None, "hi", Utc::now()).is_err());
        assert!(Comment::new(1, 0, 3, "bob", None, "hi", Utc::now()).is_err());
    }
}
