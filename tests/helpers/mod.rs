//! Shared setup for router-level tests: in-memory SQLite, fake media tools,
//! fake object storage and throwaway directories.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio::{fs::File, io::AsyncReadExt};
use tubely::{
    AppState, Settings, auth,
    config::ThumbnailBackend,
    models::video::Video,
    routes::{self, routes::UploadLimits},
    services::{
        ingest::VideoIngest,
        media::{MediaError, MediaResult, MediaToolkit, processing_path},
        object_store::{ObjectStore, ObjectStoreError, ObjectStoreResult},
        thumbnails::ThumbnailStore,
        videos::VideoRepository,
    },
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "tubely-test-secret";
pub const PUBLIC_BASE_URL: &str = "http://localhost:8091";
pub const DISTRIBUTION_BASE: &str = "https://d111111abcdef8.cloudfront.net/";

/// Media toolkit that reports fixed dimensions and "remuxes" by copying.
pub struct FakeMedia {
    pub dimensions: (u32, u32),
    pub fail_remux: bool,
    pub fail_probe: bool,
    pub remux_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub probed_paths: Mutex<Vec<PathBuf>>,
}

impl FakeMedia {
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            dimensions: (width, height),
            fail_remux: false,
            fail_probe: false,
            remux_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            probed_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.remux_calls.load(Ordering::SeqCst) + self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probed_paths.lock().unwrap().push(path.to_path_buf());
        if self.fail_probe {
            return Err(MediaError::NoVideoStream);
        }
        Ok(self.dimensions)
    }

    async fn remux_fast_start(&self, input: &Path) -> MediaResult<PathBuf> {
        self.remux_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remux {
            return Err(MediaError::TimedOut {
                tool: "ffmpeg",
                timeout: Duration::from_secs(1),
            });
        }
        let output = processing_path(input);
        tokio::fs::copy(input, &output)
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        Ok(output)
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Object store that keeps uploads in memory, or fails every call.
#[derive(Default)]
pub struct FakeObjects {
    pub fail: bool,
    pub objects: Mutex<Vec<StoredObject>>,
}

impl FakeObjects {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn put_object(
        &self,
        key: &str,
        mut body: File,
        content_type: &str,
    ) -> ObjectStoreResult<()> {
        if self.fail {
            return Err(ObjectStoreError::UploadFailed {
                key: key.to_string(),
                message: "bucket unavailable".into(),
            });
        }
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            data,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub media: Arc<FakeMedia>,
    pub objects: Arc<FakeObjects>,
    pub temp_dir: TempDir,
    pub assets_dir: TempDir,
}

impl TestApp {
    pub async fn spawn(backend: ThumbnailBackend, media: FakeMedia, objects: FakeObjects) -> Self {
        Self::spawn_with_limits(backend, media, objects, UploadLimits::default()).await
    }

    pub async fn spawn_with_limits(
        backend: ThumbnailBackend,
        media: FakeMedia,
        objects: FakeObjects,
        limits: UploadLimits,
    ) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let videos = VideoRepository::new(Arc::new(pool));
        videos.migrate().await.expect("migrations");

        let temp_dir = TempDir::new().unwrap();
        let assets_dir = TempDir::new().unwrap();
        let media = Arc::new(media);
        let objects = Arc::new(objects);

        let state = AppState {
            videos,
            ingest: VideoIngest::new(media.clone(), objects.clone(), Duration::from_secs(5)),
            thumbnails: ThumbnailStore::new(backend, assets_dir.path().to_path_buf()),
            settings: Arc::new(Settings {
                jwt_secret: JWT_SECRET.into(),
                public_base_url: PUBLIC_BASE_URL.into(),
                distribution_base: DISTRIBUTION_BASE.into(),
                assets_root: assets_dir.path().to_path_buf(),
                temp_dir: temp_dir.path().to_path_buf(),
            }),
        };

        let app = routes::routes::routes_with_limits(assets_dir.path(), None, limits)
            .with_state(state.clone());
        let server = TestServer::new(app).expect("test server");

        Self {
            server,
            state,
            media,
            objects,
            temp_dir,
            assets_dir,
        }
    }

    pub async fn create_video(&self, owner: Uuid) -> Video {
        self.state
            .videos
            .create_video(owner, "Boot.dev beats", "lofi for coding")
            .await
            .expect("create video")
    }

    pub async fn fetch_video(&self, id: Uuid) -> Video {
        self.state.videos.get_video(id).await.expect("get video")
    }

    /// Names of whatever is left in the scratch directory.
    pub fn leftover_temp_files(&self) -> Vec<String> {
        std::fs::read_dir(self.temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

pub fn bearer(user_id: Uuid) -> String {
    let token = auth::make_jwt(user_id, JWT_SECRET, chrono::Duration::hours(1)).unwrap();
    format!("Bearer {}", token)
}
