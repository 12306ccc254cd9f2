//! The video record owned by the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video entry as stored in SQLite and returned to clients.
///
/// Only the owning user may change `thumbnail_url` or `video_url`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    pub id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub title: String,

    pub description: String,

    /// Public URL of the thumbnail, once one has been uploaded.
    pub thumbnail_url: Option<String>,

    /// Public URL of the processed video in object storage.
    pub video_url: Option<String>,

    /// The user allowed to modify this record.
    pub user_id: Uuid,
}

impl Video {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// Body of `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoParams {
    pub title: String,
    #[serde(default)]
    pub description: String,
}
