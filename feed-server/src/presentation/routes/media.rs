use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::post;
use tower_http::services::ServeDir;

use crate::presentation::AppState;
use crate::presentation::handlers::media::upload_media;
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let upload = Router::new()
        .route("/api/media", post(upload_media))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.media_max_bytes));

    // Загруженные файлы раздаются тем же процессом.
    upload.nest_service("/media", ServeDir::new(&state.media_root))
}
