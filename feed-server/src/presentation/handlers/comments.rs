use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::comment::{AddCommentRequest, Comment};
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct AddCommentDto {
    #[validate(length(min = 1, max = 1000))]
    pub(crate) text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct CommentDto {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) author_avatar_url: Option<String>,
    pub(crate) text: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username: comment.author_username,
            author_avatar_url: comment.author_avatar_url,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    tag = "comments",
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "Comments, oldest first", body = [CommentDto]),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Vec<CommentDto>>)> {
    let comments = state.feed_service.list_comments(id).await?;

    Ok((
        StatusCode::OK,
        Json(comments.into_iter().map(CommentDto::from).collect()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    tag = "comments",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    request_body = AddCommentDto,
    responses(
        (status = 201, description = "Comment added", body = CommentDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn add_comment(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(dto): Json<AddCommentDto>,
) -> AppResult<(StatusCode, Json<CommentDto>)> {
    dto.validate()?;
    let req = AddCommentRequest { text: dto.text };

    let comment = state
        .feed_service
        .add_comment(auth.user_id, id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments/stream",
    tag = "comments",
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "SSE stream of comment snapshots, closed when the post is deleted", content_type = "text/event-stream"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn stream_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let subscription = state.feed_service.subscribe_comments(id).await?;
    let stream = ReceiverStream::new(subscription.into_receiver()).map(|comments| {
        let dtos: Vec<CommentDto> = comments.into_iter().map(CommentDto::from).collect();
        Event::default().json_data(dtos)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
