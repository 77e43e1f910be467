use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::data::media_store::MediaStore;
use crate::presentation::AppState;
use crate::presentation::app_error::{AppError, AppResult};
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MediaDto {
    pub(crate) url: String,
}

/// Контракт аплоада: тело запроса — сырые байты картинки, тип берётся из
/// Content-Type. Одна попытка; ретраи — забота клиента.
#[utoipa::path(
    post,
    path = "/api/media",
    tag = "media",
    security(
        ("bearer_auth" = [])
    ),
    request_body(content = Vec<u8>, content_type = "image/jpeg"),
    responses(
        (status = 201, description = "Image stored", body = MediaDto),
        (status = 400, description = "Unsupported content type or empty body"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large"),
        (status = 502, description = "Storage failure"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn upload_media(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<MediaDto>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Content-Type header is required".to_string()))?;

    let stored = state.media_store.put(&body, content_type).await?;

    Ok((StatusCode::CREATED, Json(MediaDto { url: stored.url })))
}
