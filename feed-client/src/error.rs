use thiserror::Error;

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `feed-client`.
pub enum FeedClientError {
    /// Ошибка HTTP-транспорта (`reqwest`).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Требуется авторизация (отсутствует/некорректен токен).
    #[error("unauthorized")]
    Unauthorized,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Некорректный запрос или бизнес-ошибка валидации.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Сервер не смог сохранить картинку.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Повреждённый кадр в SSE-стриме.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Результат операций `feed-client`.
pub type FeedClientResult<T> = Result<T, FeedClientError>;

impl FeedClientError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            reqwest::StatusCode::BAD_GATEWAY => {
                Self::Upload(message.unwrap_or_else(|| format!("http status {status}")))
            }
            status if status.is_server_error() => {
                Self::Upload(message.unwrap_or_else(|| format!("http status {status}")))
            }
            _ => {
                let message = message.unwrap_or_else(|| format!("http status {status}"));
                Self::InvalidRequest(message)
            }
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }

    /// Имеет ли смысл повторять запрос: сетевые и серверные сбои — да,
    /// ошибки валидации и авторизации — нет.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Upload(_))
    }
}
