use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tubely::{
    AppState, Settings,
    config::{AppConfig, ObjectStoreBackend},
    routes,
    services::{
        ingest::VideoIngest,
        media::FfmpegToolkit,
        object_store::{LocalObjectStore, ObjectStore, S3ObjectStore},
        thumbnails::ThumbnailStore,
        videos::VideoRepository,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        addr = %cfg.addr(),
        thumbnail_backend = ?cfg.thumbnail_backend,
        object_store = ?cfg.object_store,
        distribution_base = %cfg.distribution_base,
        "Starting tubely"
    );

    // --- Ensure working directories exist ---
    for dir in [&cfg.assets_root, &cfg.temp_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir.display());
        }
    }

    // --- Initialize SQLite connection ---
    tracing::debug!("Connecting to {}", cfg.database_url);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&cfg.database_url)
            .await?,
    );
    let videos = VideoRepository::new(db);

    // --- Schema is idempotent; `--migrate` stops after applying it ---
    videos.migrate().await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Initialize services ---
    let (objects, object_dir) = match cfg.object_store {
        ObjectStoreBackend::S3 => {
            let store: Arc<dyn ObjectStore> = Arc::new(
                S3ObjectStore::new(
                    cfg.s3_bucket.clone(),
                    cfg.s3_region.clone(),
                    cfg.s3_endpoint.clone(),
                )
                .await,
            );
            (store, None)
        }
        ObjectStoreBackend::Local => {
            fs::create_dir_all(&cfg.object_dir)?;
            let store: Arc<dyn ObjectStore> =
                Arc::new(LocalObjectStore::new(cfg.object_dir.clone()));
            (store, Some(cfg.object_dir.as_path()))
        }
    };
    let media = Arc::new(FfmpegToolkit::new(
        cfg.ffmpeg_path.clone(),
        cfg.ffprobe_path.clone(),
        cfg.media_timeout,
    ));

    let state = AppState {
        videos,
        ingest: VideoIngest::new(media, objects, cfg.upload_timeout),
        thumbnails: ThumbnailStore::new(cfg.thumbnail_backend, cfg.assets_root.clone()),
        settings: Arc::new(Settings {
            jwt_secret: cfg.jwt_secret.clone(),
            public_base_url: cfg.public_base_url.clone(),
            distribution_base: cfg.distribution_base.clone(),
            assets_root: cfg.assets_root.clone(),
            temp_dir: cfg.temp_dir.clone(),
        }),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(&cfg.assets_root, object_dir).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
