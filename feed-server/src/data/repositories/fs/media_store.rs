use std::path::PathBuf;

use async_trait::async_trait;
use rand::RngCore;

use crate::data::media_store::{MediaStore, StoredMedia};
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct FsMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsMediaStore {
    pub(crate) fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn extension_for(content_type: &str) -> Option<&'static str> {
        match content_type {
            "image/jpeg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            _ => None,
        }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<StoredMedia, DomainError> {
        let ext = Self::extension_for(content_type).ok_or(DomainError::Validation {
            field: "content_type",
            message: "must be image/jpeg, image/png, image/webp or image/gif",
        })?;
        if bytes.is_empty() {
            return Err(DomainError::Validation {
                field: "body",
                message: "must not be empty",
            });
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| DomainError::Upload(err.to_string()))?;

        let name = format!("{}.{ext}", random_hex(16));
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| DomainError::Upload(err.to_string()))?;

        Ok(StoredMedia {
            url: format!(
                "{}/media/{name}",
                self.public_base_url.trim_end_matches('/')
            ),
        })
    }
}

fn random_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{FsMediaStore, random_hex};
    use crate::data::media_store::MediaStore;
    use crate::domain::error::DomainError;

    fn temp_root() -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock must be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("feed_media_test_{nanos}"))
    }

    #[tokio::test]
    async fn put_writes_file_and_returns_public_url() {
        let root = temp_root();
        let store = FsMediaStore::new(&root, "http://127.0.0.1:8080/");

        let stored = store
            .put(b"not really a jpeg", "image/jpeg")
            .await
            .expect("put must succeed");

        assert!(stored.url.starts_with("http://127.0.0.1:8080/media/"));
        assert!(stored.url.ends_with(".jpg"));

        let name = stored
            .url
            .rsplit('/')
            .next()
            .expect("url must contain a file name");
        let on_disk = tokio::fs::read(root.join(name))
            .await
            .expect("file must exist");
        assert_eq!(on_disk, b"not really a jpeg");

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn put_rejects_unsupported_content_type() {
        let store = FsMediaStore::new(temp_root(), "http://127.0.0.1:8080");

        let err = store
            .put(b"plain text", "text/plain")
            .await
            .expect_err("content type must be rejected");
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "content_type",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn put_rejects_empty_body() {
        let store = FsMediaStore::new(temp_root(), "http://127.0.0.1:8080");

        let err = store
            .put(b"", "image/png")
            .await
            .expect_err("empty body must be rejected");
        assert!(matches!(
            err,
            DomainError::Validation { field: "body", .. }
        ));
    }

    #[test]
    fn random_hex_has_expected_length() {
        let value = random_hex(16);
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
