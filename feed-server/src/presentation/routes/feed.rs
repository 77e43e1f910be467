use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::presentation::AppState;
use crate::presentation::handlers::feed::{get_feed, stream_feed};
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    // Лента всегда считается глазами конкретного зрителя, поэтому оба
    // маршрута за auth.
    Router::new()
        .route("/", get(get_feed))
        .route("/stream", get(stream_feed))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}
