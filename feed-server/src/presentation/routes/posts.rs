use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};

use crate::presentation::AppState;
use crate::presentation::handlers::comments::{add_comment, list_comments, stream_comments};
use crate::presentation::handlers::posts::{
    create_post, delete_post, get_post, toggle_like, update_post,
};
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/{id}", get(get_post))
        .route("/{id}/comments", get(list_comments))
        .route("/{id}/comments/stream", get(stream_comments));

    let protected = Router::new()
        .route("/", post(create_post))
        .route("/{id}", put(update_post).delete(delete_post))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/comments", post(add_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    public.merge(protected)
}
