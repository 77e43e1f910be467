use axum::Router;
use axum::extract::DefaultBodyLimit;

use super::AppState;

pub(crate) mod auth;
pub(crate) mod feed;
pub(crate) mod media;
pub(crate) mod posts;
pub(crate) mod profiles;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    // У /api/media собственный, больший лимит тела, поэтому общий лимит
    // вешается только на остальной API.
    let api = Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/profile", profiles::me_router(state.clone()))
        .nest("/api/profiles", profiles::public_router())
        .nest("/api/feed", feed::router(state.clone()))
        .nest("/api/posts", posts::router(state.clone()))
        .layer(DefaultBodyLimit::max(state.body_limit_bytes));

    api.merge(media::router(state))
}
