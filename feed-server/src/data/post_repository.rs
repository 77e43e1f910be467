use async_trait::async_trait;

use crate::domain::comment::Comment;
use crate::domain::error::DomainError;
use crate::domain::post::{FeedPost, LikeOutcome, Post};

#[derive(Debug, Clone)]
pub(crate) struct NewPost {
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_avatar_url: Option<String>,
    pub(crate) text: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewComment {
    pub(crate) post_id: i64,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_avatar_url: Option<String>,
    pub(crate) text: String,
}

#[async_trait]
pub(crate) trait PostRepository: Send + Sync {
    /// Вставка поста. Повтор с тем же idempotency-ключом возвращает уже
    /// созданный пост, а не дубликат.
    async fn create_post(&self, input: NewPost) -> Result<Post, DomainError>;
    async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn update_post_owned(
        &self,
        post_id: i64,
        owner_id: i64,
        text: String,
    ) -> Result<Option<Post>, DomainError>;
    async fn delete_post(&self, id: i64) -> Result<bool, DomainError>;

    /// Снапшот ленты глазами `viewer_id`: от новых к старым, `liked_by_viewer`
    /// и `like_count` считаются в том же запросе.
    async fn feed(&self, viewer_id: i64, limit: u32) -> Result<Vec<FeedPost>, DomainError>;

    /// Атомарный переключатель лайка: удалить, если есть, иначе вставить,
    /// счётчик меняется в той же транзакции.
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<LikeOutcome, DomainError>;

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DomainError>;
    async fn add_comment(&self, input: NewComment) -> Result<Comment, DomainError>;
}
