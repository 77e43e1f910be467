//! Клиентская библиотека для работы с feed-server по HTTP.
//!
//! Играет роль слоя данных мобильного приложения: хранит JWT-токен после
//! `register`/`login`, публикует посты (сначала картинка, потом документ),
//! отдаёт ленту и комментарии как одноразовые снапшоты или живые SSE-потоки.
//!
//! Загрузка картинки повторяется с экспоненциальным backoff (до 3 попыток);
//! вставка поста защищена idempotency-ключом, поэтому ретрай не плодит
//! дубликатов. Если загрузка так и не удалась, черновик возвращается
//! вызывающему нетронутым.
#![warn(missing_docs)]

mod error;
mod http_client;
mod models;
mod sse;

pub use error::{FeedClientError, FeedClientResult};
pub use models::{
    AuthResponse, Comment, FeedPost, FeedSnapshot, LikeOutcome, Post, Profile, ProfilePatch,
};

use std::time::Duration;

use futures::Stream;
use rand::RngCore;
use thiserror::Error;

use http_client::HttpClient;

const UPLOAD_MAX_ATTEMPTS: u32 = 3;
const UPLOAD_BACKOFF_BASE_MS: u64 = 200;

#[derive(Debug, Clone)]
/// Прикреплённая к черновику картинка.
pub struct ImageAttachment {
    /// Сырые байты картинки.
    pub bytes: Vec<u8>,
    /// MIME-тип, например `image/jpeg`.
    pub content_type: String,
}

#[derive(Debug, Clone)]
/// Черновик поста: текст и/или картинка.
///
/// Idempotency-ключ генерируется при создании черновика и живёт столько же,
/// сколько сам черновик, поэтому повторная публикация того же черновика
/// не создаёт второй пост.
pub struct PostDraft {
    /// Текст поста.
    pub text: Option<String>,
    /// Прикреплённая картинка.
    pub image: Option<ImageAttachment>,
    idempotency_key: String,
}

impl PostDraft {
    /// Пустой черновик.
    pub fn new() -> Self {
        Self {
            text: None,
            image: None,
            idempotency_key: random_key(),
        }
    }

    /// Черновик с текстом.
    pub fn text(text: impl Into<String>) -> Self {
        let mut draft = Self::new();
        draft.text = Some(text.into());
        draft
    }

    /// Добавляет картинку к черновику.
    pub fn with_image(mut self, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.image = Some(ImageAttachment {
            bytes,
            content_type: content_type.into(),
        });
        self
    }

    /// Черновик без текста (после trim) и без картинки публиковать нечем.
    pub fn is_empty(&self) -> bool {
        let has_text = self
            .text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        !has_text && self.image.is_none()
    }
}

impl Default for PostDraft {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
/// Ошибки публикации поста.
pub enum PublishError {
    /// В черновике нет ни текста, ни картинки.
    #[error("draft is empty: text or image required")]
    EmptyDraft {
        /// Черновик, возвращённый вызывающему.
        draft: PostDraft,
    },

    /// Картинка не загрузилась; черновик возвращается нетронутым, чтобы
    /// пользователь мог повторить публикацию без перенабора.
    #[error("image upload failed: {source}")]
    Upload {
        /// Черновик, возвращённый вызывающему.
        draft: PostDraft,
        /// Причина сбоя.
        source: FeedClientError,
    },

    /// Картинка загрузилась (или не требовалась), но вставка поста не
    /// удалась.
    #[error("post creation failed: {source}")]
    Create {
        /// Причина сбоя.
        source: FeedClientError,
    },
}

#[derive(Debug, Clone)]
/// Клиент социальной ленты: профили, посты, лайки, комментарии, медиа.
pub struct FeedClient {
    http: HttpClient,
    token: Option<String>,
}

impl FeedClient {
    /// Создаёт клиент с базовым URL сервера, например `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(base_url),
            token: None,
        }
    }

    /// Устанавливает JWT-токен вручную.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Возвращает текущий JWT-токен, если он установлен.
    pub fn get_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Очищает сохранённый JWT-токен.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Регистрирует пользователя и сохраняет полученный JWT-токен в клиенте.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> FeedClientResult<AuthResponse> {
        let result = self.http.register(username, email, password).await?;
        self.token = Some(result.access_token.clone());
        Ok(result)
    }

    /// Выполняет вход пользователя и сохраняет полученный JWT-токен в клиенте.
    pub async fn login(&mut self, username: &str, password: &str) -> FeedClientResult<AuthResponse> {
        let result = self.http.login(username, password).await?;
        self.token = Some(result.access_token.clone());
        Ok(result)
    }

    /// Возвращает профиль владельца токена.
    ///
    /// Требует установленный JWT-токен.
    pub async fn me(&self) -> FeedClientResult<Profile> {
        let token = self.require_token()?;
        self.http.me(token).await
    }

    /// Частично обновляет собственный профиль: `None`-поля не меняются.
    ///
    /// Требует установленный JWT-токен.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> FeedClientResult<Profile> {
        let token = self.require_token()?;
        self.http.update_profile(token, patch).await
    }

    /// Возвращает профиль по идентификатору.
    pub async fn get_profile(&self, id: i64) -> FeedClientResult<Profile> {
        self.http.get_profile(id).await
    }

    /// Возвращает один снапшот ленты глазами текущего пользователя.
    ///
    /// Требует установленный JWT-токен.
    pub async fn feed(&self) -> FeedClientResult<FeedSnapshot> {
        let token = self.require_token()?;
        self.http.fetch_feed(token).await
    }

    /// Открывает живую подписку на ленту. Дроп стрима закрывает соединение —
    /// это единственный и достаточный способ отписки.
    ///
    /// Требует установленный JWT-токен.
    pub async fn watch_feed(
        &self,
    ) -> FeedClientResult<impl Stream<Item = FeedClientResult<FeedSnapshot>>> {
        let token = self.require_token()?;
        self.http.subscribe_feed(token).await
    }

    /// Публикует черновик.
    ///
    /// Если приложена картинка, сначала она загружается (до 3 попыток с
    /// backoff), и только потом вставляется пост — недозагруженный пост
    /// появиться не может. При сбое загрузки черновик возвращается
    /// вызывающему нетронутым.
    pub async fn publish(&self, draft: PostDraft) -> Result<FeedPost, PublishError> {
        if draft.is_empty() {
            return Err(PublishError::EmptyDraft { draft });
        }
        let token = match self.require_token() {
            Ok(token) => token.to_string(),
            Err(source) => return Err(PublishError::Create { source }),
        };

        let image_url = match &draft.image {
            Some(image) => match self.upload_with_retry(&token, image).await {
                Ok(url) => Some(url),
                Err(source) => return Err(PublishError::Upload { draft, source }),
            },
            None => None,
        };

        self.http
            .create_post(
                &token,
                draft.text.as_deref(),
                image_url.as_deref(),
                Some(&draft.idempotency_key),
            )
            .await
            .map_err(|source| PublishError::Create { source })
    }

    /// Получает пост по идентификатору.
    pub async fn get_post(&self, id: i64) -> FeedClientResult<Post> {
        self.http.get_post(id).await
    }

    /// Обновляет текст поста (единственное изменяемое поле).
    ///
    /// Требует установленный JWT-токен.
    pub async fn update_post(&self, id: i64, text: &str) -> FeedClientResult<Post> {
        let token = self.require_token()?;
        self.http.update_post(token, id, text).await
    }

    /// Удаляет пост по идентификатору.
    ///
    /// Требует установленный JWT-токен.
    pub async fn delete_post(&self, id: i64) -> FeedClientResult<()> {
        let token = self.require_token()?;
        self.http.delete_post(token, id).await
    }

    /// Переключает лайк на посте: стоит — снимает, не стоит — ставит.
    ///
    /// Требует установленный JWT-токен.
    pub async fn toggle_like(&self, id: i64) -> FeedClientResult<LikeOutcome> {
        let token = self.require_token()?;
        self.http.toggle_like(token, id).await
    }

    /// Возвращает комментарии поста, от старых к новым.
    pub async fn comments(&self, post_id: i64) -> FeedClientResult<Vec<Comment>> {
        self.http.list_comments(post_id).await
    }

    /// Добавляет комментарий к посту.
    ///
    /// Требует установленный JWT-токен.
    pub async fn add_comment(&self, post_id: i64, text: &str) -> FeedClientResult<Comment> {
        let token = self.require_token()?;
        self.http.add_comment(token, post_id, text).await
    }

    /// Открывает живую подписку на комментарии поста.
    pub async fn watch_comments(
        &self,
        post_id: i64,
    ) -> FeedClientResult<impl Stream<Item = FeedClientResult<Vec<Comment>>>> {
        self.http.subscribe_comments(post_id).await
    }

    /// Загружает картинку и возвращает её публичный URL. Одна попытка; для
    /// публикации с ретраями используйте [`FeedClient::publish`].
    ///
    /// Требует установленный JWT-токен.
    pub async fn upload_image(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> FeedClientResult<String> {
        let token = self.require_token()?;
        self.http.upload_image(token, bytes, content_type).await
    }

    async fn upload_with_retry(
        &self,
        token: &str,
        image: &ImageAttachment,
    ) -> FeedClientResult<String> {
        let mut attempt = 1;
        loop {
            match self
                .http
                .upload_image(token, &image.bytes, &image.content_type)
                .await
            {
                Ok(url) => return Ok(url),
                Err(err) if attempt < UPLOAD_MAX_ATTEMPTS && err.is_retryable() => {
                    tokio::time::sleep(upload_backoff(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn require_token(&self) -> FeedClientResult<&str> {
        self.token.as_deref().ok_or(FeedClientError::Unauthorized)
    }
}

fn upload_backoff(attempt: u32) -> Duration {
    Duration::from_millis(UPLOAD_BACKOFF_BASE_MS << (attempt - 1))
}

fn random_key() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{FeedClient, PostDraft, PublishError, random_key, upload_backoff};

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(upload_backoff(1), Duration::from_millis(200));
        assert_eq!(upload_backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn draft_without_content_is_empty() {
        assert!(PostDraft::new().is_empty());
        assert!(PostDraft::text("   ").is_empty());
        assert!(!PostDraft::text("hi").is_empty());
        assert!(!PostDraft::new().with_image(vec![1], "image/png").is_empty());
    }

    #[test]
    fn drafts_get_distinct_idempotency_keys() {
        let a = PostDraft::new();
        let b = PostDraft::new();
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert_eq!(a.idempotency_key.len(), 32);
    }

    #[test]
    fn random_key_is_hex() {
        assert!(random_key().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn publish_returns_empty_draft_without_network_calls() {
        let client = FeedClient::new("http://127.0.0.1:1");

        let err = client
            .publish(PostDraft::new())
            .await
            .expect_err("empty draft must be rejected");
        assert!(matches!(err, PublishError::EmptyDraft { .. }));
    }

    #[tokio::test]
    async fn publish_requires_token() {
        let client = FeedClient::new("http://127.0.0.1:1");

        let err = client
            .publish(PostDraft::text("hi"))
            .await
            .expect_err("publish without token must fail");
        assert!(matches!(err, PublishError::Create { .. }));
    }
}
