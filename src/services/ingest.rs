//! Video ingestion: staged upload → fast-start remux → orientation probe →
//! object storage under `<orientation-prefix><random-name>.mp4`.
//!
//! Every temporary file is owned by a guard that deletes it on drop, so no
//! exit path (including errors and cancelled requests) leaves files behind.

use crate::services::{
    media::{MediaError, MediaToolkit, processing_path, video_orientation},
    object_store::{ObjectStore, ObjectStoreError},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use std::{
    io::{self, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::TempPath;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, info};

const RANDOM_NAME_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
    #[error("object upload did not finish within {0:?}")]
    UploadTimedOut(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// An upload being written to a named temp file. The file is deleted when
/// this value is dropped.
pub struct StagedUpload {
    file: File,
    path: TempPath,
    bytes_written: u64,
}

impl StagedUpload {
    /// Create `tubely-upload-*.mp4` in `temp_dir`, readable by the external
    /// tools even when they run as another user.
    pub fn create(temp_dir: &Path) -> io::Result<Self> {
        let named = tempfile::Builder::new()
            .prefix("tubely-upload-")
            .suffix(".mp4")
            .tempfile_in(temp_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(named.path(), std::fs::Permissions::from_mode(0o666))?;
        }

        let (file, path) = named.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            bytes_written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes so external tools see the complete file.
    pub async fn finish(&mut self) -> io::Result<u64> {
        self.file.flush().await?;
        Ok(self.bytes_written)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Removes the wrapped path when dropped.
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!(path = %self.0.display(), "removed scratch file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                path = %self.0.display(),
                error = %err,
                "failed to remove scratch file"
            ),
        }
    }
}

/// 32 bytes from the OS RNG, URL-safe base64 without padding (43 chars).
pub fn random_object_name() -> String {
    let mut buf = [0u8; RANDOM_NAME_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// The remux → classify → upload half of a video upload.
#[derive(Clone)]
pub struct VideoIngest {
    pub media: Arc<dyn MediaToolkit>,
    pub objects: Arc<dyn ObjectStore>,
    /// Bound on a single object upload; nothing is retried.
    pub upload_timeout: Duration,
}

impl VideoIngest {
    pub fn new(
        media: Arc<dyn MediaToolkit>,
        objects: Arc<dyn ObjectStore>,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            media,
            objects,
            upload_timeout,
        }
    }

    /// Process a fully staged upload and return the storage key it was
    /// written under. The remuxed file is removed before returning.
    pub async fn ingest(&self, staged: &StagedUpload, content_type: &str) -> IngestResult<String> {
        // Owns the output path from before ffmpeg starts writing it.
        let mut processed = ScratchFile(processing_path(staged.path()));
        processed.0 = self.media.remux_fast_start(staged.path()).await?;
        debug!(path = %processed.0.display(), "remuxed for fast start");

        let mut body = File::open(&processed.0).await?;
        body.seek(SeekFrom::Start(0)).await?;

        let orientation = video_orientation(self.media.as_ref(), &processed.0).await?;
        let key = format!("{}{}.mp4", orientation.key_prefix(), random_object_name());

        tokio::time::timeout(
            self.upload_timeout,
            self.objects.put_object(&key, body, content_type),
        )
        .await
        .map_err(|_| IngestError::UploadTimedOut(self.upload_timeout))??;

        info!(key = %key, %orientation, "uploaded video object");
        Ok(key)
    }
}
