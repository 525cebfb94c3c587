//! Handlers for the `/workspaces` resource and its media collection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_core::error::CoreError;
use engui_core::media::MediaType;
use engui_core::types::DbId;
use engui_core::workspace::validate_workspace_name;
use engui_db::models::workspace::{
    CreateWorkspace, CreateWorkspaceMedia, UpdateWorkspace, UpdateWorkspaceMedia, Workspace,
    WorkspaceMediaQuery,
};
use engui_db::repositories::{WorkspaceMediaRepo, WorkspaceRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn workspace_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Workspace",
        id,
    })
}

fn media_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "WorkspaceMedia",
        id,
    })
}

/// Load a workspace owned by the caller or fail with 404.
async fn find_owned(state: &AppState, id: DbId, user_id: &str) -> AppResult<Workspace> {
    WorkspaceRepo::find_for_user(&state.pool, id, user_id)
        .await?
        .ok_or_else(|| workspace_not_found(id))
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

/// GET /api/v1/workspaces
///
/// The default workspace is created on first access, so the list is never
/// empty.
pub async fn list_workspaces(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    WorkspaceRepo::get_or_create_default(&state.pool, &user.user_id).await?;
    let workspaces = WorkspaceRepo::list_with_counts(&state.pool, &user.user_id).await?;
    Ok(Json(DataResponse { data: workspaces }))
}

/// POST /api/v1/workspaces
pub async fn create_workspace(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorkspace>,
) -> AppResult<impl IntoResponse> {
    validate_workspace_name(&input.name)?;
    let workspace = WorkspaceRepo::create(&state.pool, &user.user_id, &input).await?;
    tracing::info!(workspace_id = workspace.id, user_id = %user.user_id, "Workspace created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: workspace })))
}

/// GET /api/v1/workspaces/{id}
pub async fn get_workspace(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workspace = find_owned(&state, id, &user.user_id).await?;
    Ok(Json(DataResponse { data: workspace }))
}

/// PUT /api/v1/workspaces/{id}
pub async fn update_workspace(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateWorkspace>,
) -> AppResult<impl IntoResponse> {
    if let Some(name) = &input.name {
        validate_workspace_name(name)?;
    }
    let workspace = WorkspaceRepo::update(&state.pool, id, &user.user_id, &input)
        .await?
        .ok_or_else(|| workspace_not_found(id))?;
    Ok(Json(DataResponse { data: workspace }))
}

/// DELETE /api/v1/workspaces/{id}
///
/// The default workspace cannot be deleted (409). Media in the workspace
/// are removed with it.
pub async fn delete_workspace(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let workspace = find_owned(&state, id, &user.user_id).await?;
    if workspace.is_default {
        return Err(AppError::Core(CoreError::Conflict(
            "The default workspace cannot be deleted".into(),
        )));
    }
    if !WorkspaceRepo::delete(&state.pool, id, &user.user_id).await? {
        return Err(workspace_not_found(id));
    }
    tracing::info!(workspace_id = id, user_id = %user.user_id, "Workspace deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/workspaces/{id}/default
pub async fn set_default_workspace(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workspace = WorkspaceRepo::set_default(&state.pool, id, &user.user_id)
        .await?
        .ok_or_else(|| workspace_not_found(id))?;
    Ok(Json(DataResponse { data: workspace }))
}

// ---------------------------------------------------------------------------
// Workspace media
// ---------------------------------------------------------------------------

/// GET /api/v1/workspaces/{id}/media?media_type=&favorites_only=&limit=&offset=
pub async fn list_media(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<WorkspaceMediaQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(media_type) = &params.media_type {
        MediaType::parse(media_type)?;
    }
    find_owned(&state, id, &user.user_id).await?;
    let media = WorkspaceMediaRepo::list(&state.pool, id, &params).await?;
    Ok(Json(DataResponse { data: media }))
}

/// POST /api/v1/workspaces/{id}/media
pub async fn add_media(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateWorkspaceMedia>,
) -> AppResult<impl IntoResponse> {
    MediaType::parse(&input.media_type)?;
    if input.url.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Media url must not be empty".into(),
        )));
    }
    find_owned(&state, id, &user.user_id).await?;

    let media = WorkspaceMediaRepo::create(&state.pool, id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: media })))
}

/// PATCH /api/v1/workspaces/{id}/media/{media_id}
///
/// Toggle the favorite flag and/or move the item to another workspace the
/// caller owns.
pub async fn update_media(
    user: CurrentUser,
    State(state): State<AppState>,
    Path((id, media_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateWorkspaceMedia>,
) -> AppResult<impl IntoResponse> {
    find_owned(&state, id, &user.user_id).await?;
    if let Some(target) = input.workspace_id {
        find_owned(&state, target, &user.user_id).await?;
    }

    let media = WorkspaceMediaRepo::update(
        &state.pool,
        id,
        media_id,
        input.is_favorite,
        input.workspace_id,
    )
    .await?
    .ok_or_else(|| media_not_found(media_id))?;
    Ok(Json(DataResponse { data: media }))
}

/// DELETE /api/v1/workspaces/{id}/media/{media_id}
pub async fn delete_media(
    user: CurrentUser,
    State(state): State<AppState>,
    Path((id, media_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    find_owned(&state, id, &user.user_id).await?;
    if !WorkspaceMediaRepo::delete(&state.pool, id, media_id).await? {
        return Err(media_not_found(media_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
