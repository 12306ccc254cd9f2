//! Media inspection and fast-start remuxing through external tools.
//!
//! The pipeline talks to `ffprobe`/`ffmpeg` only through [`MediaToolkit`],
//! so tests can swap in a fake that never spawns a process.

use async_trait::async_trait;
use serde::Deserialize;
use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

const RATIO_9_BY_16: f64 = 9.0 / 16.0;
const RATIO_16_BY_9: f64 = 16.0 / 9.0;
const RATIO_TOLERANCE: f64 = 0.02;

/// Suffix appended to the input path for the remuxed output.
pub const PROCESSING_SUFFIX: &str = ".processing";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}")]
    Failed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{tool} did not finish within {timeout:?}")]
    TimedOut {
        tool: &'static str,
        timeout: Duration,
    },
    #[error("unreadable ffprobe output: {0}")]
    InvalidProbeOutput(#[from] serde_json::Error),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("invalid video dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Aspect-ratio class of a video, which also picks its storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
    Other,
}

impl Orientation {
    /// Classify by `width / height` with a fixed tolerance of 0.02.
    pub fn classify(width: u32, height: u32) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidDimensions { width, height });
        }

        let ratio = f64::from(width) / f64::from(height);
        if (ratio - RATIO_9_BY_16).abs() <= RATIO_TOLERANCE {
            Ok(Orientation::Portrait)
        } else if (ratio - RATIO_16_BY_9).abs() <= RATIO_TOLERANCE {
            Ok(Orientation::Landscape)
        } else {
            Ok(Orientation::Other)
        }
    }

    pub fn aspect_ratio(self) -> &'static str {
        match self {
            Orientation::Portrait => "9:16",
            Orientation::Landscape => "16:9",
            Orientation::Other => "other",
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait/",
            Orientation::Landscape => "landscape/",
            Orientation::Other => "other/",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aspect_ratio())
    }
}

/// External media capabilities used by the ingest pipeline.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Width and height of the first video stream in `path`.
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)>;

    /// Rewrite `input` with its index moved to the front, without
    /// re-encoding. Returns the path of the new file; `input` is untouched.
    async fn remux_fast_start(&self, input: &Path) -> MediaResult<PathBuf>;
}

/// Probe `path` and classify its aspect ratio.
pub async fn video_orientation(media: &dyn MediaToolkit, path: &Path) -> MediaResult<Orientation> {
    let (width, height) = media.probe_dimensions(path).await?;
    let orientation = Orientation::classify(width, height)?;
    debug!(width, height, %orientation, "classified video");
    Ok(orientation)
}

/// `<input>.processing`
pub fn processing_path(input: &Path) -> PathBuf {
    let mut raw: OsString = input.as_os_str().to_owned();
    raw.push(PROCESSING_SUFFIX);
    PathBuf::from(raw)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Pick the first stream carrying dimensions, preferring `codec_type == "video"`.
fn parse_probe_dimensions(stdout: &[u8]) -> MediaResult<(u32, u32)> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;

    let sized = |s: &ProbeStream| s.width.zip(s.height);
    output
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find_map(sized)
        .or_else(|| output.streams.iter().find_map(sized))
        .ok_or(MediaError::NoVideoStream)
}

/// [`MediaToolkit`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Upper bound for a single tool run; the child is killed past it.
    pub timeout: Duration,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    async fn run(&self, tool: &'static str, mut cmd: Command) -> MediaResult<Vec<u8>> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| MediaError::Spawn { tool, source })?,
            Err(_) => {
                error!(tool, timeout = ?self.timeout, "media tool timed out");
                return Err(MediaError::TimedOut {
                    tool,
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(tool, status = %output.status, stderr = %stderr, "media tool failed");
            return Err(MediaError::Failed {
                tool,
                status: output.status,
                stderr,
            });
        }

        debug!(
            tool,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "media tool finished"
        );
        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path);

        let stdout = self.run("ffprobe", cmd).await?;
        parse_probe_dimensions(&stdout)
    }

    async fn remux_fast_start(&self, input: &Path) -> MediaResult<PathBuf> {
        let output = processing_path(input);

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&output);

        if let Err(err) = self.run("ffmpeg", cmd).await {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(err);
        }

        Ok(output)
    }
}
