use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid mime type '{0}', expected png, jpg or jpeg")]
    UnsupportedType(String),

    #[error("Image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An uploaded image file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the file and returns the path recorded on the place.
    async fn save(&self, upload: ImageUpload) -> Result<String, ImageError>;

    /// Best-effort removal on a detached task. Failures are logged, never returned.
    fn discard(&self, path: &str) -> JoinHandle<()>;
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpeg"),
        "image/jpg" => Some("jpg"),
        _ => None,
    }
}

/// Keeps images as `<uuid>.<ext>` files in one directory.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, upload: ImageUpload) -> Result<String, ImageError> {
        let ext = extension_for(&upload.content_type)
            .ok_or_else(|| ImageError::UnsupportedType(upload.content_type.clone()))?;
        if upload.bytes.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, &upload.bytes).await?;

        tracing::debug!("Stored image at {}", path.display());
        Ok(path.to_string_lossy().replace('\\', "/"))
    }

    fn discard(&self, path: &str) -> JoinHandle<()> {
        let path = PathBuf::from(path);
        let inside = path.parent() == Some(self.dir.as_path());

        tokio::spawn(async move {
            if !inside {
                tracing::warn!("Refusing to delete image outside the upload directory: {}", path.display());
                return;
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Could not delete image {}: {}", path.display(), e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            content_type: "image/png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn saves_under_the_upload_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(tmp.path().join("images"), 1024);

        let path = store.save(png(b"not really a png")).await.unwrap();

        assert!(path.ends_with(".png"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"not really a png");
    }

    #[tokio::test]
    async fn rejects_other_mime_types() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(tmp.path(), 1024);
        let upload = ImageUpload {
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };

        let err = store.save(upload).await.unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedType(t) if t == "application/pdf"));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(tmp.path(), 4);

        let err = store.save(png(b"12345")).await.unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { size: 5, limit: 4 }));
    }

    #[tokio::test]
    async fn discard_removes_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(tmp.path(), 1024);
        let path = store.save(png(b"x")).await.unwrap();

        store.discard(&path).await.unwrap();

        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn discard_of_missing_file_is_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(tmp.path(), 1024);
        let missing = tmp.path().join("gone.png");

        store.discard(&missing.to_string_lossy()).await.unwrap();
    }

    #[tokio::test]
    async fn discard_leaves_files_outside_the_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tmp.path().join("keep.png");
        std::fs::write(&outside, b"x").unwrap();
        let store = LocalImageStore::new(tmp.path().join("images"), 1024);

        store.discard(&outside.to_string_lossy()).await.unwrap();

        assert!(outside.exists());
    }
}
