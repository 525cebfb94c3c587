//! Workspace and workspace-media models and DTOs.

use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `workspaces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workspace {
    pub id: DbId,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Workspace row with its media count, used by list endpoints.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkspaceSummary {
    pub id: DbId,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub media_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkspace {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A row from the `workspace_media` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkspaceMedia {
    pub id: DbId,
    pub workspace_id: DbId,
    pub job_id: Option<DbId>,
    pub media_type: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub prompt: Option<String>,
    pub model_id: Option<String>,
    pub is_favorite: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for adding a media item to a workspace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkspaceMedia {
    pub job_id: Option<DbId>,
    pub media_type: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_secs: Option<f64>,
    pub prompt: Option<String>,
    pub model_id: Option<String>,
}

/// DTO for `PATCH /workspaces/{id}/media/{media_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkspaceMedia {
    pub is_favorite: Option<bool>,
    /// Move the item to another workspace of the same user.
    pub workspace_id: Option<DbId>,
}

/// Query parameters for listing workspace media.
#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceMediaQuery {
    pub media_type: Option<String>,
    #[serde(default)]
    pub favorites_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
