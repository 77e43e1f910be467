use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Публичная модель профиля.
pub struct Profile {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Логин (хранится в нижнем регистре).
    pub username: String,
    /// Email.
    pub email: String,
    /// Отображаемое имя.
    pub display_name: Option<String>,
    /// Биография (до 150 символов).
    pub bio: String,
    /// URL аватара.
    pub avatar_url: Option<String>,
    /// Количество постов пользователя.
    pub posts_count: i64,
    /// Количество подписчиков.
    pub followers: i64,
    /// Количество подписок.
    pub following: i64,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Дата и время последнего изменения профиля (UTC), если было.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Публичная модель поста.
pub struct Post {
    /// Идентификатор поста.
    pub id: i64,
    /// Идентификатор автора.
    pub author_id: i64,
    /// Логин автора на момент публикации.
    pub author_username: String,
    /// Аватар автора на момент публикации.
    pub author_avatar_url: Option<String>,
    /// Текст поста.
    pub text: Option<String>,
    /// URL картинки.
    pub image_url: Option<String>,
    /// Количество лайков.
    pub like_count: i64,
    /// Дата и время создания поста (UTC).
    pub created_at: DateTime<Utc>,
    /// Дата и время последнего редактирования (UTC), если было.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Пост в ленте глазами текущего пользователя.
pub struct FeedPost {
    /// Сам пост.
    #[serde(flatten)]
    pub post: Post,
    /// Лайкнут ли пост текущим пользователем.
    pub liked_by_viewer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Один снапшот ленты: посты от новых к старым.
pub struct FeedSnapshot {
    /// Посты снапшота.
    pub posts: Vec<FeedPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Комментарий к посту.
pub struct Comment {
    /// Идентификатор комментария.
    pub id: i64,
    /// Идентификатор поста.
    pub post_id: i64,
    /// Идентификатор автора.
    pub author_id: i64,
    /// Логин автора на момент комментария.
    pub author_username: String,
    /// Аватар автора на момент комментария.
    pub author_avatar_url: Option<String>,
    /// Текст комментария.
    pub text: String,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Ответ после успешной регистрации или входа.
pub struct AuthResponse {
    /// JWT access token.
    pub access_token: String,
    /// Профиль пользователя.
    pub user: Profile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
/// Результат переключения лайка.
pub struct LikeOutcome {
    /// Стоит ли лайк после переключения.
    pub liked: bool,
    /// Количество лайков после переключения.
    pub like_count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
/// Частичное обновление профиля: `None` — поле не меняется.
pub struct ProfilePatch {
    /// Новый логин.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Новое отображаемое имя.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Новая биография.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Новый URL аватара.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{FeedPost, FeedSnapshot};

    #[test]
    fn feed_post_deserializes_flattened_payload() {
        let json = r#"{
            "id": 1,
            "author_id": 10,
            "author_username": "alice",
            "author_avatar_url": null,
            "text": "hi",
            "image_url": null,
            "like_count": 2,
            "created_at": "2026-08-01T10:00:00Z",
            "updated_at": null,
            "liked_by_viewer": true
        }"#;

        let entry: FeedPost = serde_json::from_str(json).expect("payload must deserialize");
        assert_eq!(entry.post.id, 1);
        assert_eq!(entry.post.author_username, "alice");
        assert!(entry.liked_by_viewer);
    }

    #[test]
    fn feed_snapshot_deserializes_empty_list() {
        let snapshot: FeedSnapshot =
            serde_json::from_str(r#"{"posts": []}"#).expect("payload must deserialize");
        assert!(snapshot.posts.is_empty());
    }
}
