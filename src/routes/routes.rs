//! Defines routes for the upload API.
//!
//! ## Structure
//! - **Videos**
//!   - `POST /api/videos`: create a draft record
//!   - `GET  /api/videos/{videoID}`: fetch a record
//!   - `POST /api/video_upload/{videoID}`: upload, remux and store a video (1 GiB cap)
//!
//! - **Thumbnails**
//!   - `POST /api/thumbnail_upload/{videoID}`: upload a thumbnail (10 MiB cap)
//!   - `GET  /api/thumbnails/{videoID}`: serve an in-memory thumbnail
//!
//! - **Static files**
//!   - `GET /assets/*`: filesystem thumbnails
//!   - `GET /objects/*`: videos, only with the local object store

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        thumbnail_handlers::{MAX_THUMBNAIL_UPLOAD_BYTES, get_thumbnail, upload_thumbnail},
        video_handlers::{MAX_VIDEO_UPLOAD_BYTES, create_video, get_video, upload_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Request body caps for the two upload routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub video_bytes: usize,
    pub thumbnail_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            video_bytes: MAX_VIDEO_UPLOAD_BYTES,
            thumbnail_bytes: MAX_THUMBNAIL_UPLOAD_BYTES,
        }
    }
}

/// Build the API router.
///
/// `object_dir` is mounted at `/objects` when videos are stored locally.
pub fn routes(assets_root: &Path, object_dir: Option<&Path>) -> Router<AppState> {
    routes_with_limits(assets_root, object_dir, UploadLimits::default())
}

pub fn routes_with_limits(
    assets_root: &Path,
    object_dir: Option<&Path>,
    limits: UploadLimits,
) -> Router<AppState> {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/videos", post(create_video))
        .route("/api/videos/{videoID}", get(get_video))
        .route(
            "/api/video_upload/{videoID}",
            post(upload_video).layer(DefaultBodyLimit::max(limits.video_bytes)),
        )
        .route(
            "/api/thumbnail_upload/{videoID}",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(limits.thumbnail_bytes)),
        )
        .route("/api/thumbnails/{videoID}", get(get_thumbnail))
        .nest_service("/assets", ServeDir::new(assets_root));

    if let Some(dir) = object_dir {
        router = router.nest_service("/objects", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http())
}
