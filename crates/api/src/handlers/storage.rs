//! Handlers for `/storage`: direct access to the caller's S3 bucket.

use std::time::Duration;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_cloud::s3::{clamp_presign_ttl, DEFAULT_PRESIGN_TTL};
use engui_cloud::store::{MediaStore, StoredObject};
use engui_core::{mime, naming};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::providers;
use crate::response::DataResponse;
use crate::state::AppState;

/// `?prefix=` for object listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
}

/// `?key=` for single-object operations.
#[derive(Debug, Deserialize)]
pub struct ObjectKeyParams {
    pub key: String,
}

/// Presign direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresignMethod {
    #[default]
    Get,
    Put,
}

/// `?key=&method=&expires_in=` for presigning.
#[derive(Debug, Deserialize)]
pub struct PresignParams {
    pub key: String,
    #[serde(default)]
    pub method: PresignMethod,
    /// Lifetime in seconds; clamped to 1 s ..= 7 days.
    pub expires_in: Option<u64>,
    /// Content type a PUT upload must be sent with.
    pub content_type: Option<String>,
}

/// Response of `GET /storage/presign`.
#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub key: String,
    pub method: PresignMethod,
    pub url: String,
    pub expires_in: u64,
}

fn require_safe_key(key: &str) -> AppResult<()> {
    if naming::is_safe_key(key) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid object key '{key}'")))
    }
}

/// GET /api/v1/storage/objects?prefix=
pub async fn list_objects(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListObjectsParams>,
) -> AppResult<impl IntoResponse> {
    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let objects = s3
        .list_objects(params.prefix.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(DataResponse { data: objects }))
}

/// POST /api/v1/storage/objects
///
/// Multipart form with a required `file` field and an optional `key`
/// field. Without a key the object is stored under `uploads/{user}/`.
pub async fn upload_object(
    user: CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<StoredObject>>)> {
    let mut file_data: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_data = Some((file_name, content_type, data.to_vec()));
            }
            "key" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    key = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    let key = key.unwrap_or_else(|| naming::upload_key(&user.user_id, &file_name));
    require_safe_key(&key)?;

    let content_type = content_type
        .filter(|ct| ct != mime::OCTET_STREAM)
        .unwrap_or_else(|| mime::mime_for_path(&file_name).to_string());

    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let stored = s3.put(&key, data, &content_type).await?;
    tracing::info!(key = %stored.key, size = stored.size, user_id = %user.user_id, "Object uploaded");
    Ok((StatusCode::CREATED, Json(DataResponse { data: stored })))
}

/// DELETE /api/v1/storage/objects?key=
pub async fn delete_object(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ObjectKeyParams>,
) -> AppResult<StatusCode> {
    require_safe_key(&params.key)?;
    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    s3.delete_object(&params.key).await?;
    tracing::info!(key = %params.key, user_id = %user.user_id, "Object deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/storage/presign?key=&method=get|put&expires_in=
pub async fn presign(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<PresignParams>,
) -> AppResult<impl IntoResponse> {
    require_safe_key(&params.key)?;
    let ttl = params
        .expires_in
        .map(Duration::from_secs)
        .map(clamp_presign_ttl)
        .unwrap_or(DEFAULT_PRESIGN_TTL);

    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let url = match params.method {
        PresignMethod::Get => s3.presigned_get(&params.key, ttl).await?,
        PresignMethod::Put => {
            s3.presigned_put(&params.key, params.content_type.as_deref(), ttl)
                .await?
        }
    };

    Ok(Json(DataResponse {
        data: PresignResponse {
            key: params.key,
            method: params.method,
            url,
            expires_in: ttl.as_secs(),
        },
    }))
}
