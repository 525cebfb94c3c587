//! Video/audio sequencer project document.
//!
//! A project is a set of tracks, each holding keyframes that place a media
//! item on the timeline. The document is stored as JSONB and exchanged as a
//! portable export file; import validates the document and copies it with
//! fresh track/keyframe ids.

use serde::{Deserialize, Serialize};

use crate::media::MediaType;
use crate::types::Timestamp;

/// Current document version written by [`export`].
pub const CURRENT_VERSION: u32 = 1;

/// Format tag stored in export envelopes.
pub const EXPORT_FORMAT: &str = "enguistudio.video-project";

/// Accepted aspect ratios.
pub const ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

/// Maximum project title length.
pub const MAX_TITLE_LEN: usize = 200;

/// Upper bound for track and keyframe volume.
pub const MAX_VOLUME: f64 = 2.0;

/// Longest timeline accepted, in seconds (24 h). Every start, duration,
/// trim offset and keyframe end must fall within it.
pub const MAX_TIMELINE_SECS: f64 = 24.0 * 60.0 * 60.0;

/// Tolerance when comparing keyframe boundaries (floating point seconds).
const EPSILON: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum ProjectFormatError {
    #[error("invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported project version {0} (max {CURRENT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("unsupported export format '{0}'")]
    UnknownFormat(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Music,
}

impl TrackKind {
    /// Whether a keyframe of `media` may be placed on this track.
    ///
    /// Video tracks take images (stills) and videos; audio and music
    /// tracks take audio, and also video whose soundtrack is used.
    pub fn accepts(self, media: MediaType) -> bool {
        match self {
            Self::Video => matches!(media, MediaType::Video | MediaType::Image),
            Self::Audio | Self::Music => matches!(media, MediaType::Audio | MediaType::Video),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub id: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub start_secs: f64,
    pub duration_secs: f64,
    #[serde(default)]
    pub trim_start_secs: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub workspace_media_id: Option<i64>,
}

impl Keyframe {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProjectDoc {
    #[serde(default = "default_version")]
    pub version: u32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

/// Portable export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectExport {
    pub format: String,
    pub exported_at: Timestamp,
    pub project: VideoProjectDoc,
}

impl VideoProjectDoc {
    /// End of the last keyframe across all tracks.
    pub fn content_end_secs(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.keyframes.iter())
            .map(Keyframe::end_secs)
            .fold(0.0, f64::max)
    }
}

/// Validate a project document and normalize its duration.
///
/// The project duration is raised to cover the last keyframe; a longer
/// declared duration (trailing silence/black) is kept.
pub fn validate(project: &mut VideoProjectDoc) -> Result<(), ProjectFormatError> {
    if project.version == 0 || project.version > CURRENT_VERSION {
        return Err(ProjectFormatError::UnsupportedVersion(project.version));
    }
    let title = project.title.trim();
    if title.is_empty() {
        return Err(invalid("Project title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(invalid(format!(
            "Project title too long (max {MAX_TITLE_LEN} chars)"
        )));
    }
    if !ASPECT_RATIOS.contains(&project.aspect_ratio.as_str()) {
        return Err(invalid(format!(
            "Invalid aspect_ratio '{}'. Must be one of: {}",
            project.aspect_ratio,
            ASPECT_RATIOS.join(", ")
        )));
    }
    if !within_timeline(project.duration_secs) {
        return Err(invalid(format!(
            "duration_secs must be between 0 and {MAX_TIMELINE_SECS}"
        )));
    }

    let mut track_ids = std::collections::HashSet::new();
    for track in &mut project.tracks {
        if !track_ids.insert(track.id.clone()) {
            return Err(invalid(format!("Duplicate track id '{}'", track.id)));
        }
        validate_volume(track.volume, &format!("track '{}'", track.id))?;
        validate_track(track)?;
    }

    project.duration_secs = project.duration_secs.max(project.content_end_secs());
    Ok(())
}

fn validate_track(track: &mut Track) -> Result<(), ProjectFormatError> {
    for kf in &track.keyframes {
        let what = format!("keyframe '{}' on track '{}'", kf.id, track.id);
        if kf.media_url.trim().is_empty() {
            return Err(invalid(format!("{what} has no media_url")));
        }
        if !track.kind.accepts(kf.media_type) {
            return Err(invalid(format!(
                "{what}: {} media cannot be placed on a {:?} track",
                kf.media_type, track.kind
            )));
        }
        for (name, value) in [
            ("start_secs", kf.start_secs),
            ("trim_start_secs", kf.trim_start_secs),
        ] {
            if !within_timeline(value) {
                return Err(invalid(format!(
                    "{what}: {name} must be between 0 and {MAX_TIMELINE_SECS}"
                )));
            }
        }
        if !within_timeline(kf.duration_secs) || kf.duration_secs <= 0.0 {
            return Err(invalid(format!("{what}: duration_secs must be > 0")));
        }
        if !within_timeline(kf.end_secs()) {
            return Err(invalid(format!(
                "{what} ends after {MAX_TIMELINE_SECS}s"
            )));
        }
        if let Some(v) = kf.volume {
            validate_volume(v, &what)?;
        }
    }

    track
        .keyframes
        .sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    for pair in track.keyframes.windows(2) {
        if pair[1].start_secs + EPSILON < pair[0].end_secs() {
            return Err(invalid(format!(
                "Keyframes '{}' and '{}' overlap on track '{}'",
                pair[0].id, pair[1].id, track.id
            )));
        }
    }
    Ok(())
}

/// Finite and inside `0..=MAX_TIMELINE_SECS`.
fn within_timeline(secs: f64) -> bool {
    secs.is_finite() && (0.0..=MAX_TIMELINE_SECS).contains(&secs)
}

fn validate_volume(volume: f64, what: &str) -> Result<(), ProjectFormatError> {
    if !volume.is_finite() || !(0.0..=MAX_VOLUME).contains(&volume) {
        return Err(invalid(format!(
            "{what}: volume must be between 0 and {MAX_VOLUME}"
        )));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ProjectFormatError {
    ProjectFormatError::Invalid(msg.into())
}

/// Wrap a project in an export envelope.
pub fn export(project: &VideoProjectDoc, at: Timestamp) -> ProjectExport {
    ProjectExport {
        format: EXPORT_FORMAT.to_string(),
        exported_at: at,
        project: project.clone(),
    }
}

/// Parse an export envelope or a bare project document, validate it and
/// assign fresh ids to every track and keyframe.
pub fn import(json: &serde_json::Value) -> Result<VideoProjectDoc, ProjectFormatError> {
    let mut project = if json.get("project").is_some() {
        let envelope: ProjectExport = serde_json::from_value(json.clone())?;
        if envelope.format != EXPORT_FORMAT {
            return Err(ProjectFormatError::UnknownFormat(envelope.format));
        }
        envelope.project
    } else {
        serde_json::from_value::<VideoProjectDoc>(json.clone())?
    };

    validate(&mut project)?;
    reassign_ids(&mut project);
    project.version = CURRENT_VERSION;
    Ok(project)
}

/// Replace every track and keyframe id with a new UUID.
pub fn reassign_ids(project: &mut VideoProjectDoc) {
    for track in &mut project.tracks {
        track.id = uuid::Uuid::new_v4().to_string();
        for kf in &mut track.keyframes {
            kf.id = uuid::Uuid::new_v4().to_string();
        }
    }
}
