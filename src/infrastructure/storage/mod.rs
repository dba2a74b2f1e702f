pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read video file {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to upload '{key}': {message}")]
    Upload { key: String, message: String },
}

/// Headers and ACL applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub content_disposition: &'static str,
    pub public_read: bool,
}

pub const PUBLIC_VIDEO: PutOptions = PutOptions {
    content_type: "video/mp4",
    cache_control: "public, max-age=31536000",
    content_disposition: "inline",
    public_read: true,
};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StorageError>;
}

/// Pushes finished videos to object storage and hands back their CDN URL.
#[derive(Clone)]
pub struct VideoUploader {
    store: Arc<dyn ObjectStore>,
    cdn_base_url: String,
}

impl VideoUploader {
    pub fn new(store: Arc<dyn ObjectStore>, cdn_base_url: &str) -> Self {
        Self {
            store,
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn upload(&self, video: &Path, job_id: &str) -> Result<String, StorageError> {
        let data = tokio::fs::read(video).await.map_err(|e| StorageError::Read {
            path: video.display().to_string(),
            message: e.to_string(),
        })?;

        let key = video_key(job_id, OffsetDateTime::now_utc());
        info!("⬆️ Uploading {} bytes to {}", data.len(), key);

        self.store
            .put_object(&key, Bytes::from(data), &PUBLIC_VIDEO)
            .await?;

        Ok(format!("{}/{}", self.cdn_base_url, key))
    }
}

pub fn video_key(job_id: &str, at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("videos/{}/{}.mp4", job_id, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use time::macros::datetime;

    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, usize, PutOptions)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StorageError> {
            self.puts.lock().unwrap().push((key.to_string(), body.len(), *options));
            Ok(())
        }
    }

    #[test]
    fn key_uses_job_id_and_millisecond_timestamp() {
        let at = datetime!(2024-01-02 03:04:05.678 UTC);
        assert_eq!(video_key("abc", at), "videos/abc/1704164645678.mp4");
    }

    #[tokio::test]
    async fn upload_returns_cdn_url_for_stored_key() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("out.mp4");
        std::fs::write(&video, b"mp4-bytes").unwrap();

        let store = Arc::new(RecordingStore::default());
        let uploader = VideoUploader::new(store.clone(), "https://cdn.example.com/");
        let url = uploader.upload(&video, "job-9").await.unwrap();

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        let (key, size, options) = &puts[0];
        assert_eq!(*size, 9);
        assert_eq!(*options, PUBLIC_VIDEO);
        assert!(key.starts_with("videos/job-9/") && key.ends_with(".mp4"));
        assert_eq!(url, format!("https://cdn.example.com/{}", key));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let uploader = VideoUploader::new(Arc::new(RecordingStore::default()), "https://cdn");
        let err = uploader
            .upload(Path::new("/nonexistent/video.mp4"), "job")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Read { .. }));
    }
}
