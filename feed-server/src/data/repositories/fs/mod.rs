pub(crate) mod media_store;
