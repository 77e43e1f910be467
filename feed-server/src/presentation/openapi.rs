use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::presentation::handlers::auth::{AuthResponseDto, LoginDto, RegisterDto};
use crate::presentation::handlers::comments::{AddCommentDto, CommentDto};
use crate::presentation::handlers::feed::{FeedQuery, FeedSnapshotDto};
use crate::presentation::handlers::media::MediaDto;
use crate::presentation::handlers::posts::{
    CreatePostDto, FeedPostDto, LikeOutcomeDto, PostDto, UpdatePostDto,
};
use crate::presentation::handlers::profiles::{ProfileDto, UpdateProfileDto};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::handlers::auth::register,
        crate::presentation::handlers::auth::login,
        crate::presentation::handlers::profiles::get_me,
        crate::presentation::handlers::profiles::update_me,
        crate::presentation::handlers::profiles::get_profile,
        crate::presentation::handlers::profiles::stream_profile,
        crate::presentation::handlers::feed::get_feed,
        crate::presentation::handlers::feed::stream_feed,
        crate::presentation::handlers::posts::get_post,
        crate::presentation::handlers::posts::create_post,
        crate::presentation::handlers::posts::update_post,
        crate::presentation::handlers::posts::delete_post,
        crate::presentation::handlers::posts::toggle_like,
        crate::presentation::handlers::comments::list_comments,
        crate::presentation::handlers::comments::add_comment,
        crate::presentation::handlers::comments::stream_comments,
        crate::presentation::handlers::media::upload_media
    ),
    components(
        schemas(
            RegisterDto,
            LoginDto,
            AuthResponseDto,
            ProfileDto,
            UpdateProfileDto,
            FeedQuery,
            FeedSnapshotDto,
            CreatePostDto,
            UpdatePostDto,
            PostDto,
            FeedPostDto,
            LikeOutcomeDto,
            AddCommentDto,
            CommentDto,
            MediaDto
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "profiles", description = "Profile endpoints"),
        (name = "feed", description = "Feed snapshots and live stream"),
        (name = "posts", description = "Post endpoints"),
        (name = "comments", description = "Comment endpoints"),
        (name = "media", description = "Image upload")
    ),
    modifiers(&SecurityAddon)
)]
pub(crate) struct ApiDoc;

pub(crate) struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.take().unwrap_or_default();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.components = Some(components);
    }
}
