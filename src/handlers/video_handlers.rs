//! Video record endpoints and the video upload pipeline entry point.

use super::{authenticate, media_type_essence, owned_video, parse_video_id};
use crate::{
    errors::AppError,
    models::video::{CreateVideoParams, Video},
    services::ingest::StagedUpload,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::info;

/// Upload cap for `POST /api/video_upload/{videoID}` (1 GiB).
pub const MAX_VIDEO_UPLOAD_BYTES: usize = 1 << 30;

const VIDEO_FIELD: &str = "video";
const ACCEPTED_VIDEO_TYPE: &str = "video/mp4";

/// `POST /api/videos`: create a draft owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<CreateVideoParams>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let user_id = authenticate(&state, &headers)?;
    let video = state
        .videos
        .create_video(user_id, &params.title, &params.description)
        .await?;
    info!(video_id = %video.id, %user_id, "created video draft");
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos/{videoID}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    authenticate(&state, &headers)?;
    Ok(Json(state.videos.get_video(video_id).await?))
}

/// `POST /api/video_upload/{videoID}`
///
/// Streams the `video` field to a temp file, hands it to the ingest
/// pipeline and records the resulting public URL. A non-`video/mp4`
/// upload is rejected before anything is written.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let mut video = owned_video(&state, &video_id, &headers).await?;
    let mut multipart =
        multipart.map_err(|_| AppError::bad_request("Expected a multipart/form-data body"))?;

    let mut field = loop {
        match multipart.next_field().await? {
            Some(field) if field.name() == Some(VIDEO_FIELD) => break field,
            Some(_) => continue,
            None => return Err(AppError::bad_request("Missing `video` form field")),
        }
    };

    let media_type = field
        .content_type()
        .map(media_type_essence)
        .unwrap_or_default();
    if media_type != ACCEPTED_VIDEO_TYPE {
        return Err(AppError::unsupported_media_type("Invalid media type"));
    }

    let mut staged = StagedUpload::create(&state.settings.temp_dir)?;
    while let Some(chunk) = field.chunk().await? {
        staged.write_chunk(&chunk).await?;
    }
    let bytes_copied = staged.finish().await?;
    info!(video_id = %video.id, bytes_copied, "staged video upload");

    let key = state.ingest.ingest(&staged, &media_type).await?;

    video.video_url = Some(format!("{}{}", state.settings.distribution_base, key));
    let video = state.videos.update_video(&video).await?;

    info!(video_id = %video.id, key = %key, "video upload complete");
    Ok(Json(video))
}
