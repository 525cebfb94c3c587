//! Generation job models and DTOs.

use engui_core::models::InputFiles;
use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub user_id: String,
    pub workspace_id: Option<DbId>,
    pub model_id: String,
    pub media_type: String,
    pub status_id: StatusId,
    pub status: String,
    pub endpoint_id: Option<String>,
    pub runpod_job_id: Option<String>,
    pub prompt: Option<String>,
    pub options: serde_json::Value,
    pub input_files: serde_json::Value,
    pub result_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub delay_time_ms: Option<i64>,
    pub cost: Option<f64>,
    pub retry_of_job_id: Option<DbId>,
    pub submitted_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Decode the stored input references.
    pub fn inputs(&self) -> InputFiles {
        serde_json::from_value(self.input_files.clone()).unwrap_or_default()
    }
}

/// DTO for submitting a new generation job via `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub model_id: String,
    pub prompt: Option<String>,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub inputs: InputFiles,
    pub workspace_id: Option<DbId>,
}

/// Row values for inserting a job, resolved by the handler.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
    pub user_id: &'a str,
    pub workspace_id: Option<DbId>,
    pub model_id: &'a str,
    pub media_type: &'a str,
    pub endpoint_id: Option<&'a str>,
    pub prompt: Option<&'a str>,
    pub options: &'a serde_json::Value,
    pub input_files: &'a serde_json::Value,
    pub retry_of_job_id: Option<DbId>,
}

/// Outcome of a RunPod poll, applied by [`crate::repositories::JobRepo::apply_completion`].
#[derive(Debug, Clone, Default)]
pub struct JobCompletion {
    pub result_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub delay_time_ms: Option<i64>,
    pub cost: Option<f64>,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status name (e.g. `queued`, `failed`).
    pub status: Option<String>,
    pub workspace_id: Option<DbId>,
    pub model_id: Option<String>,
    pub media_type: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
