use crate::services::{ingest::VideoIngest, thumbnails::ThumbnailStore, videos::VideoRepository};
use std::{path::PathBuf, sync::Arc};

/// Request-independent settings the handlers need.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    /// Base for thumbnail URLs, without a trailing slash.
    pub public_base_url: String,
    /// Prefix for video URLs, ending with `/`.
    pub distribution_base: String,
    pub assets_root: PathBuf,
    pub temp_dir: PathBuf,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub videos: VideoRepository,
    pub ingest: VideoIngest,
    pub thumbnails: ThumbnailStore,
    pub settings: Arc<Settings>,
}
