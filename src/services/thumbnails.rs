//! Thumbnail storage, selected by `ThumbnailBackend`.
//!
//! - `Filesystem` writes `<assets_root>/<video_id>.<ext>`, served statically.
//! - `InMemory` keeps the bytes in a process-wide map behind an async
//!   `RwLock`. Entries are never evicted and vanish on restart.

use crate::{config::ThumbnailBackend, models::thumbnail::Thumbnail};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{fs, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ThumbnailStoreError {
    #[error("media type `{0}` has no usable file extension")]
    InvalidMediaType(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ThumbnailStoreResult<T> = Result<T, ThumbnailStoreError>;

/// Where a saved thumbnail can be fetched from, relative to the public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredThumbnail {
    /// `/assets/<file_name>`
    Asset { file_name: String },
    /// `/api/thumbnails/<video_id>`
    Api { video_id: Uuid },
}

impl StoredThumbnail {
    pub fn url(&self, public_base_url: &str) -> String {
        match self {
            StoredThumbnail::Asset { file_name } => {
                format!("{}/assets/{}", public_base_url, file_name)
            }
            StoredThumbnail::Api { video_id } => {
                format!("{}/api/thumbnails/{}", public_base_url, video_id)
            }
        }
    }
}

#[derive(Clone)]
pub enum ThumbnailStore {
    Filesystem { assets_root: PathBuf },
    InMemory(Arc<RwLock<HashMap<Uuid, Thumbnail>>>),
}

impl ThumbnailStore {
    pub fn new(backend: ThumbnailBackend, assets_root: PathBuf) -> Self {
        match backend {
            ThumbnailBackend::Filesystem => ThumbnailStore::Filesystem { assets_root },
            ThumbnailBackend::InMemory => ThumbnailStore::InMemory(Arc::default()),
        }
    }

    /// Persist `thumbnail` for `video_id`, replacing any previous one.
    pub async fn save(
        &self,
        video_id: Uuid,
        thumbnail: Thumbnail,
    ) -> ThumbnailStoreResult<StoredThumbnail> {
        match self {
            ThumbnailStore::Filesystem { assets_root } => {
                let ext = extension_for(&thumbnail.media_type)?;
                let file_name = format!("{}.{}", video_id, ext);
                let path = assets_root.join(&file_name);
                fs::write(&path, &thumbnail.data).await?;
                debug!(path = %path.display(), size_bytes = thumbnail.data.len(), "wrote thumbnail");
                remove_stale_assets(assets_root, video_id, &file_name).await?;
                Ok(StoredThumbnail::Asset { file_name })
            }
            ThumbnailStore::InMemory(map) => {
                let size = thumbnail.data.len();
                map.write().await.insert(video_id, thumbnail);
                debug!(%video_id, size_bytes = size, "cached thumbnail in memory");
                Ok(StoredThumbnail::Api { video_id })
            }
        }
    }

    /// Only the in-memory store can answer; files are served by `/assets`.
    pub async fn get(&self, video_id: Uuid) -> Option<Thumbnail> {
        match self {
            ThumbnailStore::Filesystem { .. } => None,
            ThumbnailStore::InMemory(map) => map.read().await.get(&video_id).cloned(),
        }
    }
}

/// Delete `<video_id>.*` assets other than `keep`, left by an earlier
/// upload with a different subtype.
async fn remove_stale_assets(
    assets_root: &Path,
    video_id: Uuid,
    keep: &str,
) -> ThumbnailStoreResult<()> {
    let prefix = format!("{}.", video_id);
    let mut entries = fs::read_dir(assets_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && name != keep {
            match fs::remove_file(entry.path()).await {
                Ok(()) => debug!(file = name, "removed replaced thumbnail"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

/// File extension from the subtype of `type/subtype[; params]`.
///
/// Only ASCII alphanumerics plus `+`/`-` are accepted so the result is
/// safe to use in a file name. SVG is refused: it can carry script and
/// assets are served from the API origin.
pub fn extension_for(media_type: &str) -> ThumbnailStoreResult<String> {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence
        .split_once('/')
        .map(|(_, subtype)| subtype.trim())
        .filter(|s| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
        })
        .ok_or_else(|| ThumbnailStoreError::InvalidMediaType(media_type.to_string()))?;

    let subtype = subtype.to_ascii_lowercase();
    if subtype == "svg+xml" {
        return Err(ThumbnailStoreError::InvalidMediaType(media_type.to_string()));
    }
    Ok(subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn png() -> Thumbnail {
        Thumbnail {
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            media_type: "image/png".into(),
        }
    }

    #[test]
    fn derives_extension_from_subtype() {
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for("image/JPEG; q=0.9").unwrap(), "jpeg");
        assert!(extension_for("image/svg+xml").is_err());
        assert!(extension_for("image/SVG+XML; charset=utf-8").is_err());
        assert_eq!(extension_for("image/x-icon").unwrap(), "x-icon");
        assert!(extension_for("image").is_err());
        assert!(extension_for("image/").is_err());
        assert!(extension_for("image/../../etc").is_err());
    }

    #[tokio::test]
    async fn filesystem_store_writes_asset() {
        let dir = TempDir::new().unwrap();
        let store = ThumbnailStore::new(ThumbnailBackend::Filesystem, dir.path().to_path_buf());
        let id = Uuid::new_v4();

        let stored = store.save(id, png()).await.unwrap();

        assert_eq!(
            stored.url("http://localhost:8091"),
            format!("http://localhost:8091/assets/{}.png", id)
        );
        let written = fs::read(dir.path().join(format!("{}.png", id))).await.unwrap();
        assert_eq!(written, png().data.to_vec());
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn filesystem_store_replaces_asset_with_other_extension() {
        let dir = TempDir::new().unwrap();
        let store = ThumbnailStore::new(ThumbnailBackend::Filesystem, dir.path().to_path_buf());
        let id = Uuid::new_v4();
        let neighbour = Uuid::new_v4();

        store.save(neighbour, png()).await.unwrap();
        store.save(id, png()).await.unwrap();
        let jpeg = Thumbnail {
            data: Bytes::from_static(b"\xff\xd8\xff"),
            media_type: "image/jpeg".into(),
        };
        let stored = store.save(id, jpeg).await.unwrap();

        assert_eq!(
            stored,
            StoredThumbnail::Asset {
                file_name: format!("{}.jpeg", id)
            }
        );
        assert!(!dir.path().join(format!("{}.png", id)).exists());
        assert!(dir.path().join(format!("{}.jpeg", id)).exists());
        assert!(dir.path().join(format!("{}.png", neighbour)).exists());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = ThumbnailStore::new(ThumbnailBackend::InMemory, PathBuf::new());
        let id = Uuid::new_v4();

        let stored = store.save(id, png()).await.unwrap();
        assert_eq!(
            stored.url("http://localhost:8091"),
            format!("http://localhost:8091/api/thumbnails/{}", id)
        );

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.media_type, "image/png");
        assert_eq!(fetched.data, png().data);
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn in_memory_store_handles_concurrent_writers() {
        let store = ThumbnailStore::new(ThumbnailBackend::InMemory, PathBuf::new());
        let ids: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();

        let tasks = ids.iter().map(|id| {
            let store = store.clone();
            let id = *id;
            tokio::spawn(async move { store.save(id, png()).await })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        for id in ids {
            assert!(store.get(id).await.is_some());
        }
    }
}
