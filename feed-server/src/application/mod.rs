pub(crate) mod auth_service;
pub(crate) mod feed_service;
pub(crate) mod profile_service;
