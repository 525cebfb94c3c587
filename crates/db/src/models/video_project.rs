//! Stored sequencer projects.

use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `video_projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VideoProject {
    pub id: DbId,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub aspect_ratio: String,
    pub duration_secs: f64,
    pub document: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Listing form without the (potentially large) document.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VideoProjectSummary {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub aspect_ratio: String,
    pub duration_secs: f64,
    pub track_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Query parameters for project listing.
#[derive(Debug, Default, Deserialize)]
pub struct VideoProjectListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
