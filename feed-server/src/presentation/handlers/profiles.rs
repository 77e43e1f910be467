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

use crate::domain::user::{Profile, ProfilePatchRequest};
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ProfileDto {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) display_name: Option<String>,
    pub(crate) bio: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) posts_count: i64,
    pub(crate) followers: i64,
    pub(crate) following: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileDto {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            posts_count: profile.posts_count,
            followers: profile.followers,
            following: profile.following,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct UpdateProfileDto {
    #[validate(length(min = 3, max = 64))]
    pub(crate) username: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub(crate) display_name: Option<String>,
    #[validate(length(max = 150))]
    pub(crate) bio: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub(crate) avatar_url: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "profiles",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current profile", body = ProfileDto),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<ProfileDto>)> {
    let profile = state.profile_service.get_profile(auth.user_id).await?;

    Ok((StatusCode::OK, Json(ProfileDto::from(profile))))
}

#[utoipa::path(
    patch,
    path = "/api/profile",
    tag = "profiles",
    security(
        ("bearer_auth" = [])
    ),
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated", body = ProfileDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn update_me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(dto): Json<UpdateProfileDto>,
) -> AppResult<(StatusCode, Json<ProfileDto>)> {
    dto.validate()?;
    let req = ProfilePatchRequest {
        username: dto.username,
        display_name: dto.display_name,
        bio: dto.bio,
        avatar_url: dto.avatar_url,
    };

    let profile = state
        .profile_service
        .update_profile(auth.user_id, req)
        .await?;
    Ok((StatusCode::OK, Json(ProfileDto::from(profile))))
}

#[utoipa::path(
    get,
    path = "/api/profiles/{id}",
    tag = "profiles",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Profile found", body = ProfileDto),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<ProfileDto>)> {
    let profile = state.profile_service.get_profile(id).await?;

    Ok((StatusCode::OK, Json(ProfileDto::from(profile))))
}

#[utoipa::path(
    get,
    path = "/api/profiles/{id}/stream",
    tag = "profiles",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "SSE stream of profile snapshots", content_type = "text/event-stream"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn stream_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    // Точечная проверка даёт честный 404 до открытия стрима.
    state.profile_service.get_profile(id).await?;

    let subscription = state.profile_service.subscribe(id);
    let stream = ReceiverStream::new(subscription.into_receiver())
        .map(|profile| Event::default().json_data(ProfileDto::from(profile)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
