//! Handlers for `/video-projects`: stored sequencer projects with
//! portable import/export.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use engui_core::error::CoreError;
use engui_core::types::DbId;
use engui_core::video_project::{self, VideoProjectDoc};
use engui_db::models::video_project::{VideoProject, VideoProjectListQuery};
use engui_db::repositories::VideoProjectRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "VideoProject",
        id,
    })
}

async fn find_owned(state: &AppState, id: DbId, user_id: &str) -> AppResult<VideoProject> {
    VideoProjectRepo::find_for_user(&state.pool, id, user_id)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Decode the stored document of a project row.
fn stored_doc(project: &VideoProject) -> AppResult<VideoProjectDoc> {
    serde_json::from_value(project.document.clone()).map_err(|e| {
        AppError::InternalError(format!(
            "Stored document of video project {} is unreadable: {e}",
            project.id
        ))
    })
}

/// File name offered for an export download.
fn export_file_name(title: &str) -> String {
    let slug: String = title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "video-project.json".to_string()
    } else {
        format!("{slug}.json")
    }
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/video-projects?limit=&offset=
pub async fn list_projects(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<VideoProjectListQuery>,
) -> AppResult<impl IntoResponse> {
    let projects = VideoProjectRepo::list(&state.pool, &user.user_id, &params).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// POST /api/v1/video-projects
pub async fn create_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(mut doc): Json<VideoProjectDoc>,
) -> AppResult<impl IntoResponse> {
    video_project::validate(&mut doc)?;
    let project = VideoProjectRepo::create(&state.pool, &user.user_id, &doc).await?;
    tracing::info!(project_id = project.id, user_id = %user.user_id, "Video project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/video-projects/{id}
pub async fn get_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = find_owned(&state, id, &user.user_id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/video-projects/{id}
///
/// Replaces the whole document.
pub async fn update_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut doc): Json<VideoProjectDoc>,
) -> AppResult<impl IntoResponse> {
    video_project::validate(&mut doc)?;
    let project = VideoProjectRepo::update(&state.pool, id, &user.user_id, &doc)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/v1/video-projects/{id}
pub async fn delete_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !VideoProjectRepo::delete(&state.pool, id, &user.user_id).await? {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

/// POST /api/v1/video-projects/import
///
/// Accepts an export envelope or a bare project document. Track and
/// keyframe ids are regenerated.
pub async fn import_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let doc = video_project::import(&body)?;
    let project = VideoProjectRepo::create(&state.pool, &user.user_id, &doc).await?;
    tracing::info!(project_id = project.id, user_id = %user.user_id, "Video project imported");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/video-projects/{id}/export
///
/// Returns the bare export envelope as a JSON download so the file can be
/// fed straight back into the import endpoint.
pub async fn export_project(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = find_owned(&state, id, &user.user_id).await?;
    let doc = stored_doc(&project)?;
    let export = video_project::export(&doc, chrono::Utc::now());

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&project.title)
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_file_names_are_slugs() {
        assert_eq!(export_file_name("My Trailer (v2)"), "my-trailer-v2.json");
        assert_eq!(export_file_name("  "), "video-project.json");
        assert_eq!(export_file_name("Été"), "t.json");
    }
}
