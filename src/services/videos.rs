//! VideoRepository: SQLite-backed metadata store for video records.
//!
//! Upload handlers only read a record (ownership check) and overwrite its
//! media references; creation exists so records can be drafted before
//! any media is attached.

use crate::models::video::Video;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum VideoStoreError {
    #[error("video `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type VideoStoreResult<T> = Result<T, VideoStoreError>;

#[derive(Clone)]
pub struct VideoRepository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Statements are idempotent.
    pub async fn migrate(&self) -> VideoStoreResult<()> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(())
    }

    pub async fn create_video(
        &self,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> VideoStoreResult<Video> {
        let now = Utc::now();
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (id, created_at, updated_at, title, description, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, created_at, updated_at, title, description,
                      thumbnail_url, video_url, user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(title)
        .bind(description)
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;

        Ok(video)
    }

    /// Returns NotFound if no record has this id.
    pub async fn get_video(&self, id: Uuid) -> VideoStoreResult<Video> {
        sqlx::query_as::<_, Video>(
            "SELECT id, created_at, updated_at, title, description,
                    thumbnail_url, video_url, user_id
             FROM videos WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => VideoStoreError::NotFound(id),
            other => VideoStoreError::Sqlx(other),
        })
    }

    /// Overwrite the mutable fields of `video` and bump `updated_at`.
    ///
    /// Writing the same values twice leaves the same media references.
    pub async fn update_video(&self, video: &Video) -> VideoStoreResult<Video> {
        sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos
            SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, created_at, updated_at, title, description,
                      thumbnail_url, video_url, user_id
            "#,
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(Utc::now())
        .bind(video.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => VideoStoreError::NotFound(video.id),
            other => VideoStoreError::Sqlx(other),
        })
    }

    /// `SELECT 1` against the pool, used by readiness checks.
    pub async fn ping(&self) -> VideoStoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repo() -> VideoRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = VideoRepository::new(Arc::new(pool));
        repo.migrate().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn creates_and_reads_video() {
        let repo = repo().await;
        let owner = Uuid::new_v4();

        let created = repo.create_video(owner, "Boots", "a tour").await.unwrap();
        let fetched = repo.get_video(created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.user_id, owner);
        assert_eq!(fetched.title, "Boots");
        assert!(fetched.thumbnail_url.is_none());
        assert!(fetched.video_url.is_none());
    }

    #[tokio::test]
    async fn missing_video_is_not_found() {
        let repo = repo().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            repo.get_video(id).await,
            Err(VideoStoreError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let repo = repo().await;
        let mut video = repo
            .create_video(Uuid::new_v4(), "Boots", "")
            .await
            .unwrap();
        video.video_url = Some("https://cdn.example.com/landscape/abc.mp4".into());

        let once = repo.update_video(&video).await.unwrap();
        let twice = repo.update_video(&video).await.unwrap();

        assert_eq!(once.video_url, twice.video_url);
        assert_eq!(once.thumbnail_url, twice.thumbnail_url);
        assert_eq!(once.title, twice.title);
        assert_eq!(
            repo.get_video(video.id).await.unwrap().video_url,
            video.video_url
        );
    }

    #[tokio::test]
    async fn migrate_twice_is_harmless() {
        let repo = repo().await;
        repo.migrate().await.unwrap();
        repo.ping().await.unwrap();
    }
}
