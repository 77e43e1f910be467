use futures::Stream;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::error::{FeedClientError, FeedClientResult};
use crate::models::{
    AuthResponse, Comment, FeedPost, FeedSnapshot, LikeOutcome, Post, Profile, ProfilePatch,
};
use crate::sse::snapshot_stream;

#[derive(Debug, Serialize)]
struct RegisterRequestDto<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePostRequestDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdatePostRequestDto<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct AddCommentRequestDto<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaResponseDto {
    url: String,
}

#[derive(Debug, Clone)]
/// HTTP-клиент для работы с REST и SSE API `feed-server`.
pub struct HttpClient {
    base_url: String,
    client: Client,
}

impl HttpClient {
    /// Создаёт новый HTTP-клиент с базовым URL сервера.
    ///
    /// Таймаут на весь запрос не ставится: он убил бы долгоживущие
    /// SSE-стримы; ограничивается только установка соединения.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn decode_error(response: reqwest::Response) -> FeedClientError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body
                .error
                .unwrap_or_else(|| format!("http status {status}")),
            Err(_) => format!("http status {status}"),
        };
        FeedClientError::from_http_status(status, Some(message))
    }

    /// универсальный helper для отправки запросов с json-payload
    async fn send_json<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: &TReq,
        token: Option<&str>,
    ) -> FeedClientResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        let url = self.endpoint(path);

        let mut request = self.client.request(method, url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<TRes>()
            .await
            .map_err(FeedClientError::from_reqwest)
    }

    /// GET с опциональным токеном и json-ответом.
    async fn get_json<TRes>(&self, path: &str, token: Option<&str>) -> FeedClientResult<TRes>
    where
        TRes: DeserializeOwned,
    {
        let url = self.endpoint(path);

        let mut request = self.client.request(Method::GET, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<TRes>()
            .await
            .map_err(FeedClientError::from_reqwest)
    }

    async fn open_sse(&self, path: &str, token: Option<&str>) -> FeedClientResult<reqwest::Response> {
        let url = self.endpoint(path);

        let mut request = self
            .client
            .request(Method::GET, url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    /// Регистрирует пользователя и возвращает JWT + профиль.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> FeedClientResult<AuthResponse> {
        let payload = RegisterRequestDto {
            username,
            email,
            password,
        };
        self.send_json(Method::POST, "/api/auth/register", &payload, None)
            .await
    }

    /// Выполняет вход и возвращает JWT + профиль.
    pub async fn login(&self, username: &str, password: &str) -> FeedClientResult<AuthResponse> {
        let payload = LoginRequestDto { username, password };
        self.send_json(Method::POST, "/api/auth/login", &payload, None)
            .await
    }

    /// Возвращает профиль владельца токена.
    pub async fn me(&self, token: &str) -> FeedClientResult<Profile> {
        self.get_json("/api/profile", Some(token)).await
    }

    /// Частично обновляет профиль владельца токена (merge-семантика).
    pub async fn update_profile(
        &self,
        token: &str,
        patch: &ProfilePatch,
    ) -> FeedClientResult<Profile> {
        self.send_json(Method::PATCH, "/api/profile", patch, Some(token))
            .await
    }

    /// Возвращает профиль по идентификатору.
    pub async fn get_profile(&self, id: i64) -> FeedClientResult<Profile> {
        self.get_json(&format!("/api/profiles/{id}"), None).await
    }

    /// Возвращает один снапшот ленты.
    pub async fn fetch_feed(&self, token: &str) -> FeedClientResult<FeedSnapshot> {
        self.get_json("/api/feed", Some(token)).await
    }

    /// Открывает SSE-подписку на ленту. Дроп стрима закрывает соединение.
    pub async fn subscribe_feed(
        &self,
        token: &str,
    ) -> FeedClientResult<impl Stream<Item = FeedClientResult<FeedSnapshot>>> {
        let response = self.open_sse("/api/feed/stream", Some(token)).await?;
        Ok(snapshot_stream(response))
    }

    /// Получает пост по идентификатору.
    pub async fn get_post(&self, id: i64) -> FeedClientResult<Post> {
        self.get_json(&format!("/api/posts/{id}"), None).await
    }

    /// Создаёт пост. `idempotency_key` делает повтор вставки безопасным.
    pub async fn create_post(
        &self,
        token: &str,
        text: Option<&str>,
        image_url: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> FeedClientResult<FeedPost> {
        let url = self.endpoint("/api/posts");
        let payload = CreatePostRequestDto { text, image_url };

        let mut request = self
            .client
            .request(Method::POST, url)
            .json(&payload)
            .bearer_auth(token);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<FeedPost>()
            .await
            .map_err(FeedClientError::from_reqwest)
    }

    /// Обновляет текст поста.
    pub async fn update_post(&self, token: &str, id: i64, text: &str) -> FeedClientResult<Post> {
        let payload = UpdatePostRequestDto { text };
        self.send_json(
            Method::PUT,
            &format!("/api/posts/{id}"),
            &payload,
            Some(token),
        )
        .await
    }

    /// Удаляет пост по идентификатору.
    pub async fn delete_post(&self, token: &str, id: i64) -> FeedClientResult<()> {
        let url = self.endpoint(&format!("/api/posts/{id}"));

        let request = self.client.request(Method::DELETE, url).bearer_auth(token);

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        Ok(())
    }

    /// Переключает лайк текущего пользователя на посте.
    pub async fn toggle_like(&self, token: &str, id: i64) -> FeedClientResult<LikeOutcome> {
        let url = self.endpoint(&format!("/api/posts/{id}/like"));

        let request = self.client.request(Method::POST, url).bearer_auth(token);

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<LikeOutcome>()
            .await
            .map_err(FeedClientError::from_reqwest)
    }

    /// Возвращает комментарии поста, от старых к новым.
    pub async fn list_comments(&self, post_id: i64) -> FeedClientResult<Vec<Comment>> {
        self.get_json(&format!("/api/posts/{post_id}/comments"), None)
            .await
    }

    /// Добавляет комментарий к посту.
    pub async fn add_comment(
        &self,
        token: &str,
        post_id: i64,
        text: &str,
    ) -> FeedClientResult<Comment> {
        let payload = AddCommentRequestDto { text };
        self.send_json(
            Method::POST,
            &format!("/api/posts/{post_id}/comments"),
            &payload,
            Some(token),
        )
        .await
    }

    /// Открывает SSE-подписку на комментарии поста.
    pub async fn subscribe_comments(
        &self,
        post_id: i64,
    ) -> FeedClientResult<impl Stream<Item = FeedClientResult<Vec<Comment>>>> {
        let response = self
            .open_sse(&format!("/api/posts/{post_id}/comments/stream"), None)
            .await?;
        Ok(snapshot_stream(response))
    }

    /// Загружает картинку и возвращает её публичный URL. Одна попытка.
    pub async fn upload_image(
        &self,
        token: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> FeedClientResult<String> {
        let url = self.endpoint("/api/media");

        let request = self
            .client
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .bearer_auth(token);

        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        let dto = response
            .json::<MediaResponseDto>()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        Ok(dto.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_slashes() {
        let client = HttpClient::new("http://localhost:8080/");
        let full = client.endpoint("/api/feed");
        assert_eq!(full, "http://localhost:8080/api/feed");
    }

    #[test]
    fn create_post_dto_skips_absent_fields() {
        let payload = CreatePostRequestDto {
            text: Some("hi"),
            image_url: None,
        };
        let json = serde_json::to_string(&payload).expect("payload must serialize");
        assert_eq!(json, r#"{"text":"hi"}"#);
    }
}
