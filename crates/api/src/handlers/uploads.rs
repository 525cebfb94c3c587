//! Handler for `POST /uploads`: input media for generation jobs.
//!
//! Files land in the local store under `uploads/{user}/` and are served
//! back through `/api/v1/files/`. Job submission turns those URLs into
//! data URIs (or presigned URLs for S3 objects) before calling RunPod.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use engui_cloud::store::MediaStore;
use engui_core::media::{self, MediaType};
use engui_core::{ffmpeg, mime, naming};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Description of a stored upload.
#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub key: String,
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
}

/// Work out the media type and MIME type of an upload from its declared
/// content type and file name. The extension must be on the allow-list for
/// the resulting media type.
fn classify(file_name: &str, declared: Option<&str>) -> AppResult<(MediaType, &'static str)> {
    let ext = mime::extension_of(file_name).ok_or_else(|| {
        AppError::BadRequest(format!("File '{file_name}' has no extension"))
    })?;

    let kind = declared
        .filter(|ct| *ct != mime::OCTET_STREAM)
        .and_then(mime::media_type_for_mime)
        .or_else(|| mime::media_type_for_path(file_name))
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported file type '.{ext}'")))?;

    if !mime::is_allowed_upload(kind, &ext) {
        return Err(AppError::BadRequest(format!(
            "'.{ext}' is not an accepted {kind} format"
        )));
    }
    let mime_type = mime::mime_for_extension(&ext).unwrap_or(mime::OCTET_STREAM);
    Ok((kind, mime_type))
}

/// POST /api/v1/uploads
///
/// Multipart form with a required `file` field.
pub async fn upload_file(
    user: CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadedFile>>)> {
    let mut file_data: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file_data = Some((file_name, content_type, data.to_vec()));
    }

    let (file_name, declared, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    let (media_type, mime_type) = classify(&file_name, declared.as_deref())?;

    let dimensions = match media_type {
        MediaType::Image => media::image_dimensions(&data),
        _ => None,
    };

    let key = naming::upload_key(&user.user_id, &file_name);
    let stored = state.local_store.put(&key, data, mime_type).await?;

    let mut uploaded = UploadedFile {
        key: stored.key,
        url: stored.url,
        file_name: naming::sanitize_file_name(&file_name),
        mime_type: mime_type.to_string(),
        media_type,
        size: stored.size,
        width: dimensions.map(|d| d.width),
        height: dimensions.map(|d| d.height),
        duration_secs: None,
    };

    if media_type != MediaType::Image {
        let path = state.local_store.path_for(&uploaded.key)?;
        match ffmpeg::probe_media(&path).await {
            Ok(probe) => {
                if probe.width > 0 && probe.height > 0 {
                    uploaded.width = Some(probe.width as u32);
                    uploaded.height = Some(probe.height as u32);
                }
                uploaded.duration_secs = Some(probe.duration_secs);
            }
            Err(e) => tracing::warn!(key = %uploaded.key, error = %e, "Could not probe upload"),
        }
    }

    tracing::info!(
        key = %uploaded.key,
        media_type = %media_type,
        size = uploaded.size,
        user_id = %user.user_id,
        "File uploaded",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: uploaded })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_declared_content_type() {
        let (kind, mime_type) = classify("clip.mp4", Some("video/mp4")).unwrap();
        assert_eq!(kind, MediaType::Video);
        assert_eq!(mime_type, "video/mp4");
    }

    #[test]
    fn classify_falls_back_to_extension() {
        let (kind, _) = classify("photo.PNG", Some("application/octet-stream")).unwrap();
        assert_eq!(kind, MediaType::Image);
        let (kind, _) = classify("voice.wav", None).unwrap();
        assert_eq!(kind, MediaType::Audio);
    }

    #[test]
    fn classify_rejects_mismatched_or_unknown() {
        assert!(classify("photo.mp4", Some("image/png")).is_err());
        assert!(classify("notes.txt", None).is_err());
        assert!(classify("noext", Some("image/png")).is_err());
    }
}
