//! Handlers for the `/loras` resource.
//!
//! LoRA weight files live in the caller's S3 bucket under
//! `loras/{user}/`; the `loras` table is an index over those objects.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_cloud::s3::DEFAULT_PRESIGN_TTL;
use engui_core::error::CoreError;
use engui_core::mime::{self, LORA_EXTENSIONS, OCTET_STREAM};
use engui_core::naming::{self, LORAS_PREFIX};
use engui_core::types::DbId;
use engui_db::models::lora::{Lora, NewLora, UpdateLora};
use engui_db::repositories::LoraRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::providers;
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted LoRA file, 2 GiB.
pub const MAX_LORA_BYTES: usize = 2 * 1024 * 1024 * 1024;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Lora", id })
}

/// Display name derived from a file name: the stem, or the whole name.
fn display_name(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
        .to_string()
}

/// Non-empty trimmed text, or `None`.
fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Listing and metadata
// ---------------------------------------------------------------------------

/// GET /api/v1/loras
pub async fn list_loras(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let loras = LoraRepo::list(&state.pool, &user.user_id).await?;
    Ok(Json(DataResponse { data: loras }))
}

/// GET /api/v1/loras/{id}
pub async fn get_lora(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lora = LoraRepo::find_for_user(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: lora }))
}

/// PUT /api/v1/loras/{id}
pub async fn update_lora(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateLora>,
) -> AppResult<impl IntoResponse> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Core(CoreError::Validation(
            "LoRA name must not be empty".into(),
        )));
    }
    let lora = LoraRepo::update(&state.pool, id, &user.user_id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: lora }))
}

// ---------------------------------------------------------------------------
// Upload / delete
// ---------------------------------------------------------------------------

/// POST /api/v1/loras
///
/// Multipart form with a required `file` field and optional `name`,
/// `model_family` and `trigger_words` fields. The file is written to the
/// caller's bucket; re-uploading a file name replaces the object.
pub async fn upload_lora(
    user: CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<Lora>>)> {
    let mut file_data: Option<(String, Vec<u8>)> = None;
    let mut name: Option<String> = None;
    let mut model_family: Option<String> = None;
    let mut trigger_words: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                if !mime::is_lora_file(&file_name) {
                    return Err(AppError::BadRequest(format!(
                        "Unsupported LoRA file '{file_name}'. Supported: .{}",
                        LORA_EXTENSIONS.join(", .")
                    )));
                }
                let mut data = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                {
                    if data.len() + chunk.len() > MAX_LORA_BYTES {
                        return Err(AppError::BadRequest(
                            "LoRA file exceeds the 2 GiB limit".into(),
                        ));
                    }
                    data.extend_from_slice(&chunk);
                }
                file_data = Some((file_name, data));
            }
            "name" | "model_family" | "trigger_words" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let value = non_empty(text);
                match field_name.as_str() {
                    "name" => name = value,
                    "model_family" => model_family = value,
                    _ => trigger_words = value,
                }
            }
            _ => {}
        }
    }

    let (file_name, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded LoRA file is empty".into()));
    }

    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let file_name = naming::sanitize_file_name(&file_name);
    let storage_key = naming::lora_key(&user.user_id, &file_name);
    let file_size = data.len() as i64;

    s3.put_object(&storage_key, data, OCTET_STREAM).await?;

    let lora = LoraRepo::upsert(
        &state.pool,
        &user.user_id,
        &NewLora {
            name: name.unwrap_or_else(|| display_name(&file_name)),
            file_name,
            storage_key,
            file_size,
            model_family,
            trigger_words,
        },
    )
    .await?;

    tracing::info!(lora_id = lora.id, file_size, user_id = %user.user_id, "LoRA uploaded");
    Ok((StatusCode::CREATED, Json(DataResponse { data: lora })))
}

/// DELETE /api/v1/loras/{id}
///
/// Removes the bucket object and the row.
pub async fn delete_lora(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let lora = LoraRepo::find_for_user(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    s3.delete_object(&lora.storage_key).await?;

    LoraRepo::delete(&state.pool, id, &user.user_id).await?;
    tracing::info!(lora_id = id, user_id = %user.user_id, "LoRA deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Sync / download
// ---------------------------------------------------------------------------

/// Outcome of [`sync_loras`].
#[derive(Debug, Serialize)]
pub struct LoraSyncResult {
    /// Objects registered or refreshed from the bucket listing.
    pub synced: usize,
    /// Rows removed because their object no longer exists.
    pub removed: u64,
    pub loras: Vec<Lora>,
}

/// POST /api/v1/loras/sync
///
/// Reconcile the table with the bucket: every LoRA object under the
/// caller's prefix gets a row, rows without an object are removed. Names
/// and metadata of existing rows are preserved.
pub async fn sync_loras(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let prefix = format!("{LORAS_PREFIX}/{}/", naming::user_segment(&user.user_id));
    let objects = s3.list_objects(&prefix).await?;

    let existing: HashMap<String, Lora> = LoraRepo::list(&state.pool, &user.user_id)
        .await?
        .into_iter()
        .map(|l| (l.storage_key.clone(), l))
        .collect();

    let mut keep_keys = Vec::new();
    for object in objects {
        let Some(file_name) = object.key.strip_prefix(&prefix) else {
            continue;
        };
        if file_name.contains('/') || !mime::is_lora_file(file_name) {
            continue;
        }
        let known = existing.get(&object.key);
        LoraRepo::upsert(
            &state.pool,
            &user.user_id,
            &NewLora {
                name: known
                    .map(|l| l.name.clone())
                    .unwrap_or_else(|| display_name(file_name)),
                file_name: file_name.to_string(),
                storage_key: object.key.clone(),
                file_size: object.size,
                model_family: None,
                trigger_words: None,
            },
        )
        .await?;
        keep_keys.push(object.key);
    }

    let removed = LoraRepo::delete_missing(&state.pool, &user.user_id, &keep_keys).await?;
    let loras = LoraRepo::list(&state.pool, &user.user_id).await?;

    tracing::info!(
        synced = keep_keys.len(),
        removed,
        user_id = %user.user_id,
        "LoRA sync finished",
    );
    Ok(Json(DataResponse {
        data: LoraSyncResult {
            synced: keep_keys.len(),
            removed,
            loras,
        },
    }))
}

/// A time-limited download URL.
#[derive(Debug, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: u64,
}

/// GET /api/v1/loras/{id}/url
pub async fn lora_url(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lora = LoraRepo::find_for_user(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let s3 = providers::s3_storage(&state, &user.user_id).await?;
    let ttl: Duration = DEFAULT_PRESIGN_TTL;
    let url = s3.presigned_get(&lora.storage_key, ttl).await?;
    Ok(Json(DataResponse {
        data: PresignedUrl {
            url,
            expires_in: ttl.as_secs(),
        },
    }))
}
