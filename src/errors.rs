use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{
    auth::AuthError,
    services::{ingest::IngestError, thumbnails::ThumbnailStoreError, videos::VideoStoreError},
};

/// Error returned from every handler. Renders as `{"error": .., "status": ..}`.
///
/// Dependency failures are logged with full detail where they are converted
/// and only a generic message reaches the client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// 500 with a client-safe message; `source` is only logged.
    pub fn internal(msg: impl Into<String>, source: impl fmt::Display) -> Self {
        let msg = msg.into();
        tracing::error!(error = %source, "{}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader | AuthError::MalformedHeader => {
                AppError::unauthorized("Couldn't find JWT")
            }
            other => {
                tracing::debug!(error = %other, "rejected bearer token");
                AppError::unauthorized("Couldn't validate JWT")
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            AppError::internal("Unable to read upload", err.body_text())
        } else {
            AppError::new(status, err.body_text())
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Media(err) => AppError::internal("Unable to process video", err),
            IngestError::Store(err) => AppError::internal("Unable to store video", err),
            err @ IngestError::UploadTimedOut(_) => {
                AppError::internal("Unable to store video", err)
            }
            IngestError::Io(err) => AppError::internal("Unable to read processed video", err),
        }
    }
}

impl From<ThumbnailStoreError> for AppError {
    fn from(err: ThumbnailStoreError) -> Self {
        match err {
            ThumbnailStoreError::InvalidMediaType(media_type) => AppError::unsupported_media_type(
                format!("Unsupported thumbnail type `{}`", media_type),
            ),
            other => AppError::internal("Unable to store thumbnail", other),
        }
    }
}

impl From<VideoStoreError> for AppError {
    fn from(err: VideoStoreError) -> Self {
        match err {
            VideoStoreError::NotFound(_) => AppError::not_found("Video not found"),
            other => AppError::internal("Couldn't access video metadata", other),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::internal("Filesystem error", err)
    }
}
