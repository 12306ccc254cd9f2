use super::{media_type_essence, owned_video, parse_video_id};
use crate::{
    errors::AppError,
    models::{thumbnail::Thumbnail, video::Video},
    services::thumbnails::extension_for,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use tracing::info;

/// Upload cap for `POST /api/thumbnail_upload/{videoID}` (10 MiB).
pub const MAX_THUMBNAIL_UPLOAD_BYTES: usize = 10 << 20;

const THUMBNAIL_FIELD: &str = "thumbnail";

/// `POST /api/thumbnail_upload/{videoID}`
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let mut video = owned_video(&state, &video_id, &headers).await?;
    let mut multipart =
        multipart.map_err(|_| AppError::bad_request("Expected a multipart/form-data body"))?;

    let field = loop {
        match multipart.next_field().await? {
            Some(field) if field.name() == Some(THUMBNAIL_FIELD) => break field,
            Some(_) => continue,
            None => return Err(AppError::bad_request("Missing `thumbnail` form field")),
        }
    };

    let media_type = field
        .content_type()
        .map(media_type_essence)
        .unwrap_or_default();
    if !media_type.starts_with("image/") || extension_for(&media_type).is_err() {
        return Err(AppError::unsupported_media_type("Invalid media type"));
    }

    let data = field.bytes().await?;
    info!(video_id = %video.id, size_bytes = data.len(), %media_type, "received thumbnail");

    let stored = state
        .thumbnails
        .save(video.id, Thumbnail { data, media_type })
        .await?;

    video.thumbnail_url = Some(stored.url(&state.settings.public_base_url));
    let video = state.videos.update_video(&video).await?;

    Ok(Json(video))
}

/// `GET /api/thumbnails/{videoID}`: serve a thumbnail from the in-memory store.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Response, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let thumbnail = state
        .thumbnails
        .get(video_id)
        .await
        .ok_or_else(|| AppError::not_found("Thumbnail not found"))?;

    let content_type = HeaderValue::from_str(&thumbnail.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok(([(header::CONTENT_TYPE, content_type)], thumbnail.data).into_response())
}
