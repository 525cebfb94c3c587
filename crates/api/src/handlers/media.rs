//! Handlers for `/media`: frame extraction ("thumbdrop") and probing of
//! videos held in the local store.

use std::path::PathBuf;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use engui_cloud::store::{LocalStore, MediaStore};
use engui_core::ffmpeg::{self, FramePosition, ThumbnailDto};
use engui_core::{media, naming};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted output width for extracted frames.
const MAX_FRAME_WIDTH: u32 = 4096;

/// Identifies a local media file by `/api/v1/files/...` URL or storage key.
#[derive(Debug, Deserialize)]
pub struct MediaSource {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl MediaSource {
    fn key(&self) -> AppResult<&str> {
        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key);
        }
        match self.url.as_deref() {
            Some(url) => LocalStore::key_for_url(url).ok_or_else(|| {
                AppError::BadRequest(format!("'{url}' is not a local file URL"))
            }),
            None => Err(AppError::BadRequest("Either 'url' or 'key' is required".into())),
        }
    }
}

/// Request body for `POST /media/frames`.
#[derive(Debug, Deserialize)]
pub struct ExtractFrameRequest {
    #[serde(flatten)]
    pub source: MediaSource,
    /// Defaults to the first frame.
    pub frame: Option<FramePosition>,
    /// Output width; height follows the aspect ratio.
    pub width: Option<u32>,
}

/// Request body for `POST /media/probe`.
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    #[serde(flatten)]
    pub source: MediaSource,
}

/// Resolve a source to an existing local file.
async fn local_file(state: &AppState, source: &MediaSource) -> AppResult<(String, PathBuf)> {
    let key = source.key()?;
    let path = state.local_store.path_for(key)?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AppError::NotFound(format!("File '{key}' not found")));
    }
    Ok((key.to_string(), path))
}

/// POST /api/v1/media/frames
///
/// Extract the first, last or a timestamped frame of a local video as a
/// JPEG stored next to the caller's thumbnails.
pub async fn extract_frame(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<ExtractFrameRequest>,
) -> AppResult<impl IntoResponse> {
    if input.width.is_some_and(|w| w == 0 || w > MAX_FRAME_WIDTH) {
        return Err(AppError::BadRequest(format!(
            "width must be between 1 and {MAX_FRAME_WIDTH}"
        )));
    }
    let position = input.frame.unwrap_or(FramePosition::First);
    let (source_key, source_path) = local_file(&state, &input.source).await?;

    let source_name = source_key.rsplit('/').next().unwrap_or(&source_key);
    let key = naming::thumbnail_key(&user.user_id, source_name, &position.label(), "jpg");
    let output_path = state.local_store.path_for(&key)?;

    let timestamp_secs =
        ffmpeg::extract_frame_at(&source_path, &output_path, position, input.width).await?;

    let dimensions = match tokio::fs::read(&output_path).await {
        Ok(bytes) => media::image_dimensions(&bytes),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Could not read extracted frame");
            None
        }
    };

    tracing::info!(
        source = %source_key,
        key = %key,
        timestamp_secs,
        user_id = %user.user_id,
        "Frame extracted",
    );
    Ok(Json(DataResponse {
        data: ThumbnailDto {
            url: state.local_store.url_for(&key),
            key,
            timestamp_secs,
            width: dimensions.map(|d| d.width),
            height: dimensions.map(|d| d.height),
        },
    }))
}

/// POST /api/v1/media/probe
pub async fn probe_media(
    _user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<ProbeRequest>,
) -> AppResult<impl IntoResponse> {
    let (_, path) = local_file(&state, &input.source).await?;
    let probe = ffmpeg::probe_media(&path).await?;
    Ok(Json(DataResponse { data: probe }))
}
