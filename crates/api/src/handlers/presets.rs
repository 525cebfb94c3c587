//! Handlers for the `/presets` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_core::error::CoreError;
use engui_core::preset::{validate_description, validate_parameters, validate_preset_name};
use engui_core::types::DbId;
use engui_db::models::preset::{CreatePreset, Preset, UpdatePreset};
use engui_db::repositories::PresetRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::query::ModelFilter;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Preset",
        id,
    })
}

/// GET /api/v1/presets?model_id=
pub async fn list_presets(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(filter): Query<ModelFilter>,
) -> AppResult<impl IntoResponse> {
    let presets = PresetRepo::list(&state.pool, &user.user_id, filter.model_id.as_deref()).await?;
    Ok(Json(DataResponse { data: presets }))
}

/// POST /api/v1/presets
///
/// Returns 409 if the caller already has a preset with this name for the
/// same model.
pub async fn create_preset(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePreset>,
) -> AppResult<impl IntoResponse> {
    validate_preset_name(&input.name)?;
    validate_description(input.description.as_deref())?;
    validate_parameters(&input.model_id, &input.parameters)?;

    let preset = PresetRepo::create(&state.pool, &user.user_id, &input).await?;
    tracing::info!(preset_id = preset.id, model_id = %preset.model_id, "Preset created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: preset })))
}

/// GET /api/v1/presets/{id}
pub async fn get_preset(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let preset = PresetRepo::find_for_user(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: preset }))
}

/// PUT /api/v1/presets/{id}
pub async fn update_preset(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdatePreset>,
) -> AppResult<impl IntoResponse> {
    let existing = PresetRepo::find_for_user(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;

    if let Some(name) = &input.name {
        validate_preset_name(name)?;
    }
    validate_description(input.description.as_deref())?;
    if let Some(parameters) = &input.parameters {
        validate_parameters(&existing.model_id, parameters)?;
    }

    let preset = PresetRepo::update(&state.pool, id, &user.user_id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: preset }))
}

/// DELETE /api/v1/presets/{id}
pub async fn delete_preset(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !PresetRepo::delete(&state.pool, id, &user.user_id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Response of [`use_preset`]: the parameters to apply plus the updated row.
#[derive(Debug, Serialize)]
pub struct PresetUse {
    pub parameters: serde_json::Value,
    pub preset: Preset,
}

/// POST /api/v1/presets/{id}/use
///
/// Increment the usage counter and return the preset's parameters.
pub async fn use_preset(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let preset = PresetRepo::record_use(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse {
        data: PresetUse {
            parameters: preset.parameters.clone(),
            preset,
        },
    }))
}
