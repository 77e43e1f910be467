use async_trait::async_trait;

use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct StoredMedia {
    pub(crate) url: String,
}

/// Хранилище картинок: принимает байты, возвращает публичный URL.
/// Одна попытка, без ретраев — повторы остаются на совести клиента.
#[async_trait]
pub(crate) trait MediaStore: Send + Sync {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<StoredMedia, DomainError>;
}
