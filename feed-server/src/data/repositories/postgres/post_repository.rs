use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::post_repository::{NewComment, NewPost, PostRepository};
use crate::domain::comment::Comment;
use crate::domain::error::DomainError;
use crate::domain::post::{FeedPost, LikeOutcome, Post};

#[derive(Debug, Clone)]
pub(crate) struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Post>, DomainError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts \
             WHERE idempotency_key = $1"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: i64,
    author_username: String,
    author_avatar_url: Option<String>,
    text: Option<String>,
    image_url: Option<String>,
    like_count: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct FeedPostRow {
    #[sqlx(flatten)]
    post: PostRow,
    liked_by_viewer: bool,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    author_username: String,
    author_avatar_url: Option<String>,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LikeCountRow {
    like_count: i64,
}

const POST_COLUMNS: &str =
    "id, author_id, author_username, author_avatar_url, text, image_url, \
     like_count, created_at, updated_at";

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create_post(&self, input: NewPost) -> Result<Post, DomainError> {
        let sql = format!(
            "INSERT INTO posts (author_id, author_username, author_avatar_url, \
                                text, image_url, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {POST_COLUMNS}"
        );

        let mut tx = self.pool.begin().await.map_err(map_post_db_error)?;

        let inserted = sqlx::query_as::<_, PostRow>(&sql)
            .bind(input.author_id)
            .bind(&input.author_username)
            .bind(&input.author_avatar_url)
            .bind(&input.text)
            .bind(&input.image_url)
            .bind(&input.idempotency_key)
            .fetch_one(&mut *tx)
            .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) => {
                // Повтор с тем же idempotency-ключом — не ошибка, а ретрай:
                // отдаём уже созданный пост.
                if is_unique_violation(&err, "posts_idempotency_key_key")
                    && let Some(key) = input.idempotency_key.as_deref()
                {
                    drop(tx);
                    return self.find_by_idempotency_key(key).await?.ok_or_else(|| {
                        DomainError::Unexpected(
                            "idempotency key conflict without stored post".to_string(),
                        )
                    });
                }
                return Err(map_post_db_error(err));
            }
        };

        sqlx::query("UPDATE users SET posts_count = posts_count + 1 WHERE id = $1")
            .bind(input.author_id)
            .execute(&mut *tx)
            .await
            .map_err(map_post_db_error)?;

        tx.commit().await.map_err(map_post_db_error)?;

        map_row_to_post(row)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts \
             WHERE id = $1"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post).transpose()
    }

    async fn update_post_owned(
        &self,
        post_id: i64,
        owner_id: i64,
        text: String,
    ) -> Result<Option<Post>, DomainError> {
        let sql = format!(
            "UPDATE posts \
             SET text = $3, \
                 updated_at = now() \
             WHERE id = $1 AND author_id = $2 \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .bind(owner_id)
            .bind(text)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post).transpose()
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DomainError> {
        // Лайки и комментарии уходят каскадом по FK.
        let mut tx = self.pool.begin().await.map_err(map_post_db_error)?;

        let author_id: Option<(i64,)> =
            sqlx::query_as("DELETE FROM posts WHERE id = $1 RETURNING author_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_post_db_error)?;

        let Some((author_id,)) = author_id else {
            return Ok(false);
        };

        sqlx::query("UPDATE users SET posts_count = GREATEST(posts_count - 1, 0) WHERE id = $1")
            .bind(author_id)
            .execute(&mut *tx)
            .await
            .map_err(map_post_db_error)?;

        tx.commit().await.map_err(map_post_db_error)?;
        Ok(true)
    }

    async fn feed(&self, viewer_id: i64, limit: u32) -> Result<Vec<FeedPost>, DomainError> {
        // liked_by_viewer считается тем же запросом, без N точечных чтений
        // на снапшот.
        let sql = format!(
            "SELECT {POST_COLUMNS}, \
                    EXISTS(SELECT 1 FROM likes l \
                           WHERE l.post_id = posts.id AND l.user_id = $1) AS liked_by_viewer \
             FROM posts \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, FeedPostRow>(&sql)
            .bind(viewer_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedPost {
                    post: map_row_to_post(row.post)?,
                    liked_by_viewer: row.liked_by_viewer,
                })
            })
            .collect()
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<LikeOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_post_db_error)?;

        let deleted = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_post_db_error)?
            .rows_affected();

        let liked = deleted == 0;
        if liked {
            sqlx::query("INSERT INTO likes (post_id, user_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_post_db_error)?;
        }

        let delta: i64 = if liked { 1 } else { -1 };
        let row = sqlx::query_as::<_, LikeCountRow>(
            "UPDATE posts \
             SET like_count = GREATEST(like_count + $2, 0) \
             WHERE id = $1 \
             RETURNING like_count",
        )
        .bind(post_id)
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_post_db_error)?;

        let Some(row) = row else {
            return Err(DomainError::NotFound(format!("post id: {post_id}")));
        };

        tx.commit().await.map_err(map_post_db_error)?;

        Ok(LikeOutcome {
            liked,
            like_count: row.like_count,
        })
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, author_id, author_username, author_avatar_url, \
                    text, created_at \
             FROM comments \
             WHERE post_id = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_post_db_error)?;

        rows.into_iter().map(map_row_to_comment).collect()
    }

    async fn add_comment(&self, input: NewComment) -> Result<Comment, DomainError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "INSERT INTO comments (post_id, author_id, author_username, \
                                   author_avatar_url, text) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, post_id, author_id, author_username, author_avatar_url, \
                       text, created_at",
        )
        .bind(input.post_id)
        .bind(input.author_id)
        .bind(&input.author_username)
        .bind(&input.author_avatar_url)
        .bind(&input.text)
        .fetch_one(&self.pool)
        .await
        .map_err(map_post_db_error)?;

        map_row_to_comment(row)
    }
}

fn map_row_to_post(row: PostRow) -> Result<Post, DomainError> {
    Post::new(
        row.id,
        row.author_id,
        row.author_username,
        row.author_avatar_url,
        row.text,
        row.image_url,
        row.like_count,
        row.created_at,
        row.updated_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_row_to_comment(row: CommentRow) -> Result<Comment, DomainError> {
    Comment::new(
        row.id,
        row.post_id,
        row.author_id,
        row.author_username,
        row.author_avatar_url,
        row.text,
        row.created_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err
        && db_err.code().as_deref() == Some("23505")
    {
        return db_err.constraint() == Some(constraint);
    }
    false
}

fn map_post_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23503")
    {
        let resource = match db_err.constraint() {
            Some("likes_post_id_fkey") | Some("comments_post_id_fkey") => "post",
            Some("posts_author_id_fkey") => "author",
            _ => "resource",
        };
        return DomainError::NotFound(resource.to_string());
    }
    DomainError::Unexpected(err.to_string())
}
