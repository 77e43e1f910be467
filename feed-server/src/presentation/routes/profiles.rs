use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::presentation::AppState;
use crate::presentation::handlers::profiles::{get_me, get_profile, stream_profile, update_me};
use crate::presentation::middleware::auth::jwt_auth_middleware;

/// `/api/profile` — собственный профиль, только с токеном.
pub(crate) fn me_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_me).patch(update_me))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

/// `/api/profiles` — чужие профили, публичное чтение.
pub(crate) fn public_router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_profile))
        .route("/{id}/stream", get(stream_profile))
}
