pub mod health_handlers;
pub mod thumbnail_handlers;
pub mod video_handlers;

use crate::{
    auth::{get_bearer_token, validate_jwt},
    errors::AppError,
    models::video::Video,
    services::videos::VideoStoreError,
    state::AppState,
};
use axum::http::HeaderMap;
use uuid::Uuid;

pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid ID"))
}

/// Authenticate the caller and return their user id.
pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    let token = get_bearer_token(headers)?;
    Ok(validate_jwt(token, &state.settings.jwt_secret)?)
}

/// Checks in order: id parses (400), caller authenticated (401), video
/// exists and belongs to the caller (401 either way).
pub(crate) async fn owned_video(
    state: &AppState,
    raw_id: &str,
    headers: &HeaderMap,
) -> Result<Video, AppError> {
    let video_id = parse_video_id(raw_id)?;
    let user_id = authenticate(state, headers)?;

    let video = match state.videos.get_video(video_id).await {
        Ok(video) => video,
        Err(VideoStoreError::NotFound(_)) => {
            return Err(AppError::unauthorized("User not owner of video"));
        }
        Err(err) => return Err(err.into()),
    };

    if !video.is_owned_by(user_id) {
        tracing::warn!(%video_id, %user_id, "rejected upload from non-owner");
        return Err(AppError::unauthorized("User not owner of video"));
    }

    Ok(video)
}

/// `type/subtype` of a Content-Type value, lowercased, parameters dropped.
pub(crate) fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parameters_from_media_type() {
        assert_eq!(media_type_essence("video/mp4"), "video/mp4");
        assert_eq!(media_type_essence("Video/MP4; codecs=avc1"), "video/mp4");
        assert_eq!(media_type_essence(""), "");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(parse_video_id("nope").unwrap_err().message, "Invalid ID");
        assert!(parse_video_id("6f1c1d3e-8b1a-4c55-9f4e-2a7c0f3b9e11").is_ok());
    }
}
