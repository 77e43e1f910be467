use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::post::FeedSnapshot;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::handlers::posts::FeedPostDto;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct FeedQuery {
    #[validate(range(min = 1, max = 100))]
    pub(crate) limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FeedSnapshotDto {
    pub(crate) posts: Vec<FeedPostDto>,
}

impl From<FeedSnapshot> for FeedSnapshotDto {
    fn from(snapshot: FeedSnapshot) -> Self {
        Self {
            posts: snapshot.posts.into_iter().map(FeedPostDto::from).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/feed",
    tag = "feed",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("limit" = Option<u32>, Query, description = "Snapshot size (1..=100)")
    ),
    responses(
        (status = 200, description = "One feed snapshot for the current viewer", body = FeedSnapshotDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_feed(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<(StatusCode, Json<FeedSnapshotDto>)> {
    query.validate()?;
    let snapshot = state.feed_service.fetch(auth.user_id, query.limit).await?;

    Ok((StatusCode::OK, Json(FeedSnapshotDto::from(snapshot))))
}

#[utoipa::path(
    get,
    path = "/api/feed/stream",
    tag = "feed",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("limit" = Option<u32>, Query, description = "Snapshot size (1..=100)")
    ),
    responses(
        (status = 200, description = "SSE stream of feed snapshots", content_type = "text/event-stream"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn stream_feed(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    query.validate()?;
    let subscription = state.feed_service.subscribe(auth.user_id, query.limit);
    let stream = ReceiverStream::new(subscription.into_receiver())
        .map(|snapshot| Event::default().json_data(FeedSnapshotDto::from(snapshot)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
