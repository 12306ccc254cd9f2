//! Object storage for processed videos.
//!
//! Two backends behind [`ObjectStore`]:
//! - [`S3ObjectStore`] puts objects into an S3 (or S3-compatible) bucket;
//! - [`LocalObjectStore`] writes `{root}/{key}` on disk, for development.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, primitives::ByteStream};
use std::{
    io,
    path::{Path, PathBuf},
    time::Instant,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, error, info};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("upload of `{key}` failed: {message}")]
    UploadFailed { key: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the remaining contents of `body` under `key`.
    async fn put_object(&self, key: &str, body: File, content_type: &str)
    -> ObjectStoreResult<()>;
}

/// Reject keys that could escape the storage root.
///
/// Rejects empty or oversized keys, leading `/`, `..` and control bytes.
fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
    let unsafe_key = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');

    if unsafe_key {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// S3 bucket target.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain.
    ///
    /// `endpoint_url` switches to path-style addressing for S3-compatible
    /// providers such as MinIO.
    pub async fn new(bucket: String, region: String, endpoint_url: Option<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;

        let client = match endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };

        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: File,
        content_type: &str,
    ) -> ObjectStoreResult<()> {
        ensure_key_safe(key)?;

        let start = Instant::now();
        let stream = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| ObjectStoreError::UploadFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(stream)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                ObjectStoreError::UploadFailed {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            })?;

        info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }
}

/// Directory-backed store. Objects land at `{root}/{key}`; the content
/// type is not persisted.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    pub root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Copies into a temp file next to the target, fsyncs, then renames so
    /// readers never observe a partial object.
    async fn put_object(
        &self,
        key: &str,
        mut body: File,
        content_type: &str,
    ) -> ObjectStoreResult<()> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = match write_synced(&tmp_path, &mut body).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        debug!(
            path = %file_path.display(),
            size_bytes = written,
            content_type,
            "stored object on disk"
        );
        Ok(())
    }
}

async fn write_synced(path: &Path, body: &mut File) -> io::Result<u64> {
    let mut file = File::create(path).await?;
    let written = tokio::io::copy(body, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn source_file(dir: &TempDir, contents: &[u8]) -> File {
        let path = dir.path().join("source.mp4");
        fs::write(&path, contents).await.unwrap();
        File::open(&path).await.unwrap()
    }

    #[test]
    fn rejects_unsafe_keys() {
        for key in ["", "/etc/passwd", "../escape.mp4", "a/../../b", "bad\\key", "nul\0"] {
            assert!(ensure_key_safe(key).is_err(), "{key:?} should be rejected");
        }
        assert!(ensure_key_safe("landscape/abc_-XYZ.mp4").is_ok());
    }

    #[tokio::test]
    async fn local_store_writes_nested_key() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let store = LocalObjectStore::new(root.path());

        let body = source_file(&src, b"fake mp4 bytes").await;
        store
            .put_object("portrait/abc.mp4", body, "video/mp4")
            .await
            .unwrap();

        let stored = fs::read(root.path().join("portrait/abc.mp4")).await.unwrap();
        assert_eq!(stored, b"fake mp4 bytes");

        let mut leftovers = fs::read_dir(root.path().join("portrait")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = leftovers.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["abc.mp4".to_string()]);
    }

    #[tokio::test]
    async fn local_store_overwrites_existing_object() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let store = LocalObjectStore::new(root.path());

        store
            .put_object("other/x.mp4", source_file(&src, b"first").await, "video/mp4")
            .await
            .unwrap();
        store
            .put_object("other/x.mp4", source_file(&src, b"second").await, "video/mp4")
            .await
            .unwrap();

        let stored = fs::read(root.path().join("other/x.mp4")).await.unwrap();
        assert_eq!(stored, b"second");
    }
}
