use sqlx::PgPool;
use std::sync::Arc;

use crate::application::auth_service::AuthService;
use crate::application::feed_service::FeedService;
use crate::application::profile_service::ProfileService;
use crate::data::repositories::fs::media_store::FsMediaStore;
use crate::data::repositories::postgres::post_repository::PostgresPostRepository;
use crate::data::repositories::postgres::user_repository::PostgresUserRepository;
use crate::infrastructure::changefeed::ChangeFeed;
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::settings::Settings;

pub(crate) mod app_error;
pub(crate) mod handlers;
pub(crate) mod http_handlers;
pub(crate) mod middleware;
pub(crate) mod openapi;
pub(crate) mod routes;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) auth_service: Arc<AuthService<PostgresUserRepository>>,
    pub(crate) profile_service: Arc<ProfileService<PostgresUserRepository>>,
    pub(crate) feed_service: Arc<FeedService<PostgresPostRepository, PostgresUserRepository>>,
    pub(crate) media_store: Arc<FsMediaStore>,
    pub(crate) jwt: Arc<JwtService>,
    pub(crate) media_root: String,
    pub(crate) media_max_bytes: usize,
    pub(crate) body_limit_bytes: usize,
}

impl AppState {
    pub(crate) fn build(pool: PgPool, settings: &Settings) -> Self {
        let changes = Arc::new(ChangeFeed::new(settings.changefeed_capacity));
        let users = PostgresUserRepository::new(pool.clone());
        let posts = PostgresPostRepository::new(pool);
        let media_store = Arc::new(FsMediaStore::new(
            &settings.media_root,
            settings.media_base_url.clone(),
        ));

        Self {
            auth_service: Arc::new(AuthService::new(
                users.clone(),
                JwtService::new(&settings.jwt_secret, settings.jwt_ttl_seconds),
            )),
            profile_service: Arc::new(ProfileService::new(users.clone(), changes.clone())),
            feed_service: Arc::new(FeedService::new(
                posts,
                users,
                changes,
                settings.feed_snapshot_limit,
            )),
            media_store,
            jwt: Arc::new(JwtService::new(
                &settings.jwt_secret,
                settings.jwt_ttl_seconds,
            )),
            media_root: settings.media_root.clone(),
            media_max_bytes: settings.media_max_bytes,
            body_limit_bytes: settings.http_request_body_limit_bytes,
        }
    }
}
