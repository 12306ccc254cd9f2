use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Where uploaded thumbnails live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThumbnailBackend {
    /// `<assets_root>/<id>.<ext>`, served under `/assets`.
    Filesystem,
    /// Process-wide map, served under `/api/thumbnails/{id}`. Lost on restart.
    InMemory,
}

/// Where processed videos are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectStoreBackend {
    S3,
    /// Plain directory, served under `/objects`. Meant for development.
    Local,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub assets_root: PathBuf,
    pub public_base_url: String,
    pub thumbnail_backend: ThumbnailBackend,
    pub object_store: ObjectStoreBackend,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub object_dir: PathBuf,
    /// Prefix joined with the storage key to form public video URLs.
    pub distribution_base: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub media_timeout: Duration,
    pub upload_timeout: Duration,
    pub temp_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Tubely video upload API")]
pub struct Args {
    /// Host to bind to (overrides TUBELY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TUBELY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides TUBELY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory of publicly served assets (overrides TUBELY_ASSETS_ROOT)
    #[arg(long)]
    pub assets_root: Option<PathBuf>,

    /// Externally visible base URL of this server (overrides TUBELY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Thumbnail storage (overrides TUBELY_THUMBNAIL_BACKEND)
    #[arg(long, value_enum)]
    pub thumbnail_backend: Option<ThumbnailBackend>,

    /// Video object storage (overrides TUBELY_OBJECT_STORE)
    #[arg(long, value_enum)]
    pub object_store: Option<ObjectStoreBackend>,

    /// S3 bucket (overrides TUBELY_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// S3 region (overrides TUBELY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom S3-compatible endpoint (overrides TUBELY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Directory used by the local object store (overrides TUBELY_OBJECT_DIR)
    #[arg(long)]
    pub object_dir: Option<PathBuf>,

    /// Public URL prefix for stored videos (overrides TUBELY_DISTRIBUTION_BASE)
    #[arg(long)]
    pub distribution_base: Option<String>,

    /// ffmpeg binary (overrides TUBELY_FFMPEG)
    #[arg(long)]
    pub ffmpeg: Option<String>,

    /// ffprobe binary (overrides TUBELY_FFPROBE)
    #[arg(long)]
    pub ffprobe: Option<String>,

    /// Seconds before an ffmpeg/ffprobe run is killed (overrides TUBELY_MEDIA_TIMEOUT_SECS)
    #[arg(long)]
    pub media_timeout_secs: Option<u64>,

    /// Seconds allowed for one object upload (overrides TUBELY_UPLOAD_TIMEOUT_SECS)
    #[arg(long)]
    pub upload_timeout_secs: Option<u64>,

    /// Scratch directory for staged uploads (overrides TUBELY_TEMP_DIR)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over variables from `lookup`, then defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .or_else(|| lookup("TUBELY_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_env(&lookup, "TUBELY_PORT")?.unwrap_or(8091),
        };
        let database_url = args
            .database_url
            .or_else(|| lookup("TUBELY_DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./tubely.db?mode=rwc".into());
        let jwt_secret = lookup("TUBELY_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("TUBELY_JWT_SECRET must be set")?;
        let assets_root = args
            .assets_root
            .or_else(|| lookup("TUBELY_ASSETS_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./assets"));
        let public_base_url = args
            .public_base_url
            .or_else(|| lookup("TUBELY_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let thumbnail_backend = match args.thumbnail_backend {
            Some(backend) => backend,
            None => parse_enum(&lookup, "TUBELY_THUMBNAIL_BACKEND")?
                .unwrap_or(ThumbnailBackend::Filesystem),
        };
        let object_store = match args.object_store {
            Some(backend) => backend,
            None => parse_enum(&lookup, "TUBELY_OBJECT_STORE")?.unwrap_or(ObjectStoreBackend::S3),
        };
        let s3_bucket = args
            .s3_bucket
            .or_else(|| lookup("TUBELY_S3_BUCKET"))
            .unwrap_or_default();
        let s3_region = args
            .s3_region
            .or_else(|| lookup("TUBELY_S3_REGION"))
            .unwrap_or_else(|| "us-east-1".into());
        let s3_endpoint = args.s3_endpoint.or_else(|| lookup("TUBELY_S3_ENDPOINT"));
        let object_dir = args
            .object_dir
            .or_else(|| lookup("TUBELY_OBJECT_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./data/objects"));

        if object_store == ObjectStoreBackend::S3 && s3_bucket.is_empty() {
            bail!("TUBELY_S3_BUCKET must be set when using the s3 object store");
        }

        let distribution_base = args
            .distribution_base
            .or_else(|| lookup("TUBELY_DISTRIBUTION_BASE"))
            .unwrap_or_else(|| match object_store {
                ObjectStoreBackend::S3 => {
                    format!("https://{}.s3.{}.amazonaws.com/", s3_bucket, s3_region)
                }
                ObjectStoreBackend::Local => format!("{}/objects/", public_base_url),
            });
        let distribution_base = if distribution_base.ends_with('/') {
            distribution_base
        } else {
            format!("{}/", distribution_base)
        };

        let media_timeout_secs = match args.media_timeout_secs {
            Some(secs) => secs,
            None => parse_env(&lookup, "TUBELY_MEDIA_TIMEOUT_SECS")?.unwrap_or(600),
        };
        let upload_timeout_secs = match args.upload_timeout_secs {
            Some(secs) => secs,
            None => parse_env(&lookup, "TUBELY_UPLOAD_TIMEOUT_SECS")?.unwrap_or(600),
        };

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            assets_root,
            public_base_url,
            thumbnail_backend,
            object_store,
            s3_bucket,
            s3_region,
            s3_endpoint,
            object_dir,
            distribution_base,
            ffmpeg_path: args
                .ffmpeg
                .or_else(|| lookup("TUBELY_FFMPEG"))
                .unwrap_or_else(|| "ffmpeg".into()),
            ffprobe_path: args
                .ffprobe
                .or_else(|| lookup("TUBELY_FFPROBE"))
                .unwrap_or_else(|| "ffprobe".into()),
            media_timeout: Duration::from_secs(media_timeout_secs),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
            temp_dir: args
                .temp_dir
                .or_else(|| lookup("TUBELY_TEMP_DIR").map(PathBuf::from))
                .unwrap_or_else(env::temp_dir),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

fn parse_enum<T: ValueEnum>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    lookup(name)
        .map(|value| {
            <T as ValueEnum>::from_str(&value, true)
                .map_err(|err| anyhow::anyhow!("parsing {} value `{}`: {}", name, value, err))
        })
        .transpose()
}
