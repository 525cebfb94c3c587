//! Wrappers around the `ffprobe` and `ffmpeg` binaries.
//!
//! Uploaded and generated media is probed for duration and size, and single
//! frames are pulled out of videos. The first/last frame ("thumbdrop") feeds
//! chained image-to-video generations and workspace thumbnails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Hard limit for any single ffmpeg/ffprobe invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Seek step used for the last frame when the stream reports no frame rate.
const FALLBACK_FRAME_STEP: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum MediaToolError {
    #[error("{tool} could not be started: {source}")]
    Missing {
        tool: &'static str,
        source: std::io::Error,
    },

    #[error("{tool} exited with {code:?}: {stderr}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} did not finish within {after:?}")]
    TimedOut { tool: &'static str, after: Duration },

    #[error("unreadable probe output: {0}")]
    BadProbe(String),

    #[error("invalid frame timestamp {0}")]
    InvalidTimestamp(f64),

    #[error("media file {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which frame to extract from a video.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "position", content = "timestamp_secs")]
pub enum FramePosition {
    First,
    Last,
    At(f64),
}

impl FramePosition {
    /// Short label used in output file names.
    pub fn label(&self) -> String {
        match self {
            Self::First => "first".to_string(),
            Self::Last => "last".to_string(),
            Self::At(t) => format!("t{}", (t * 1000.0).round() as i64),
        }
    }
}

/// Description of an extracted frame, returned to API clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThumbnailDto {
    /// Storage key of the frame image.
    pub key: String,
    pub url: String,
    /// Position of the frame in the source video.
    pub timestamp_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// What the API reports about a media file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    pub width: i32,
    pub height: i32,
    pub frame_rate: f64,
    pub video_codec: Option<String>,
    pub has_audio: bool,
    pub format_name: Option<String>,
}

// `ffprobe -print_format json -show_format -show_streams`, reduced to the
// fields read below. ffprobe reports numbers as strings.
#[derive(Debug, Deserialize)]
struct RawProbe {
    #[serde(default)]
    streams: Vec<RawStream>,
    #[serde(default)]
    format: RawFormat,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

impl RawStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }
}

/// `"24000/1001"` or `"25"` as frames per second; 0 when unusable.
fn frame_rate(raw: &str) -> f64 {
    let (num, den) = raw.split_once('/').unwrap_or((raw, "1"));
    match (num.parse::<f64>(), den.parse::<f64>()) {
        (Ok(num), Ok(den)) if den > 0.0 => num / den,
        _ => 0.0,
    }
}

impl MediaProbe {
    fn from_raw(raw: &RawProbe) -> Self {
        let video = raw.streams.iter().find(|s| s.is("video"));
        let seconds = |d: Option<&String>| d.and_then(|d| d.parse::<f64>().ok());

        // Container duration wins; some encoders only tag the stream.
        let duration_secs = seconds(raw.format.duration.as_ref())
            .or_else(|| seconds(video.and_then(|v| v.duration.as_ref())))
            .unwrap_or(0.0);

        Self {
            duration_secs,
            width: video.and_then(|v| v.width).unwrap_or(0),
            height: video.and_then(|v| v.height).unwrap_or(0),
            frame_rate: video
                .and_then(|v| v.r_frame_rate.as_deref())
                .map(frame_rate)
                .unwrap_or(0.0),
            video_codec: video.and_then(|v| v.codec_name.clone()),
            has_audio: raw.streams.iter().any(|s| s.is("audio")),
            format_name: raw.format.format_name.clone(),
        }
    }

    /// Timestamp of the last decodable frame. Seeking to the exact
    /// duration yields nothing, so back off one frame interval.
    pub fn last_frame_secs(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        let step = if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            FALLBACK_FRAME_STEP
        };
        (self.duration_secs - step).max(0.0)
    }
}

/// Probe a media file.
pub async fn probe_media(path: &Path) -> Result<MediaProbe, MediaToolError> {
    require_source(path)?;

    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path);
    let stdout = run("ffprobe", cmd).await?;

    let raw: RawProbe = serde_json::from_slice(&stdout)
        .map_err(|e| MediaToolError::BadProbe(e.to_string()))?;
    Ok(MediaProbe::from_raw(&raw))
}

/// Write the frame at `timestamp_secs` to `output_path`, scaled to `width`
/// when given. The image format follows the output extension.
pub async fn extract_frame(
    video_path: &Path,
    output_path: &Path,
    timestamp_secs: f64,
    width: Option<u32>,
) -> Result<(), MediaToolError> {
    require_source(video_path)?;
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-ss", &format!("{:.3}", timestamp_secs.max(0.0))])
        .arg("-i")
        .arg(video_path)
        .args(["-frames:v", "1"]);
    if let Some(w) = width {
        cmd.args(["-vf", &format!("scale={w}:-2")]);
    }
    cmd.args(["-q:v", "2"]).arg(output_path);
    run("ffmpeg", cmd).await?;

    // ffmpeg exits 0 without output when seeking past the end.
    if !tokio::fs::try_exists(output_path).await? {
        return Err(MediaToolError::Failed {
            tool: "ffmpeg",
            code: Some(0),
            stderr: format!("no frame at {timestamp_secs:.3}s"),
        });
    }
    Ok(())
}

/// Resolve `position` against the video and extract that frame. Returns the
/// timestamp that was used.
pub async fn extract_frame_at(
    video_path: &Path,
    output_path: &Path,
    position: FramePosition,
    width: Option<u32>,
) -> Result<f64, MediaToolError> {
    let timestamp = match position {
        FramePosition::First => 0.0,
        FramePosition::At(t) if t.is_finite() && t >= 0.0 => t,
        FramePosition::At(t) => return Err(MediaToolError::InvalidTimestamp(t)),
        FramePosition::Last => probe_media(video_path).await?.last_frame_secs(),
    };
    extract_frame(video_path, output_path, timestamp, width).await?;
    Ok(timestamp)
}

fn require_source(path: &Path) -> Result<(), MediaToolError> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaToolError::SourceNotFound(path.to_path_buf()))
    }
}

/// Run `cmd` under [`COMMAND_TIMEOUT`] and return its stdout.
async fn run(tool: &'static str, mut cmd: Command) -> Result<Vec<u8>, MediaToolError> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| MediaToolError::TimedOut {
            tool,
            after: COMMAND_TIMEOUT,
        })?
        .map_err(|source| MediaToolError::Missing { tool, source })?;

    if !output.status.success() {
        return Err(MediaToolError::Failed {
            tool,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
