//! Handlers for the `/jobs` resource.
//!
//! Jobs are scoped to the calling user; another user's job is reported as
//! not found.

use axum::extract::{Path, Query, State};
use axum::http::header::HeaderMap;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use engui_cloud::s3::{S3Storage, DEFAULT_PRESIGN_TTL};
use engui_cloud::store::LocalStore;
use engui_core::error::CoreError;
use engui_core::mime;
use engui_core::models::{self, InputFiles};
use engui_core::settings::SERVICE_RUNPOD;
use engui_core::types::DbId;
use engui_db::models::job::{Job, JobListQuery, NewJob, SubmitJob};
use engui_db::models::status::JobStatus;
use engui_db::repositories::{JobRepo, WorkspaceRepo};
use serde::{Deserialize, Serialize};

use crate::background::job_sync;
use crate::error::{AppError, AppResult};
use crate::handlers::files;
use crate::middleware::user::CurrentUser;
use crate::providers;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a job owned by the caller, or 404.
async fn find_owned(pool: &sqlx::PgPool, job_id: DbId, user: &CurrentUser) -> AppResult<Job> {
    JobRepo::find_for_user(pool, job_id, &user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

/// Turn stored input references into something a RunPod worker can fetch.
///
/// Local files are inlined as base64 data URIs; objects in the caller's
/// bucket get a presigned GET URL. Anything else is passed through.
async fn resolve_inputs(
    state: &AppState,
    user_id: &str,
    inputs: &InputFiles,
) -> AppResult<InputFiles> {
    let needs_s3 = [&inputs.image, &inputs.video, &inputs.audio]
        .into_iter()
        .flatten()
        .any(|r| r.starts_with("http"));
    let s3 = if needs_s3 {
        providers::s3_storage_opt(state, user_id).await.unwrap_or_default()
    } else {
        None
    };

    Ok(InputFiles {
        image: resolve_reference(state, s3.as_ref(), inputs.image.as_deref()).await?,
        video: resolve_reference(state, s3.as_ref(), inputs.video.as_deref()).await?,
        audio: resolve_reference(state, s3.as_ref(), inputs.audio.as_deref()).await?,
    })
}

async fn resolve_reference(
    state: &AppState,
    s3: Option<&S3Storage>,
    reference: Option<&str>,
) -> AppResult<Option<String>> {
    let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if let Some(key) = LocalStore::key_for_url(reference) {
        let bytes = state.local_store.read(key).await?;
        let content_type = mime::mime_for_path(key);
        return Ok(Some(format!(
            "data:{content_type};base64,{}",
            BASE64.encode(bytes)
        )));
    }
    if let Some((s3, key)) = s3.and_then(|s| s.key_for_url(reference).map(|k| (s, k))) {
        return Ok(Some(s3.presigned_get(key, DEFAULT_PRESIGN_TTL).await?));
    }
    Ok(Some(reference.to_string()))
}

/// Create a pending job row and submit it to RunPod.
///
/// On RunPod failure the job is marked failed and the error returned.
async fn create_and_submit(
    state: &AppState,
    user: &CurrentUser,
    input: &SubmitJob,
    retry_of_job_id: Option<DbId>,
) -> AppResult<Job> {
    let model = models::require_model(&input.model_id)?;
    models::validate_generation(model, input.prompt.as_deref(), &input.inputs, &input.options)?;

    if let Some(workspace_id) = input.workspace_id {
        WorkspaceRepo::find_for_user(&state.pool, workspace_id, &user.user_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Workspace",
                id: workspace_id,
            }))?;
    }

    let settings = providers::service_settings(state, &user.user_id, SERVICE_RUNPOD).await?;
    let client = providers::runpod_client_from(state, &settings)?;
    let endpoint_id = providers::endpoint_for(model, &settings)?;

    let options = if input.options.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        input.options.clone()
    };
    let input_files = serde_json::to_value(&input.inputs)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let prompt = input.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let job = JobRepo::create(
        &state.pool,
        &NewJob {
            user_id: &user.user_id,
            workspace_id: input.workspace_id,
            model_id: model.id,
            media_type: model.output.as_str(),
            endpoint_id: Some(endpoint_id.as_str()),
            prompt,
            options: &options,
            input_files: &input_files,
            retry_of_job_id,
        },
    )
    .await?;

    let submitted = async {
        let inputs = resolve_inputs(state, &user.user_id, &input.inputs).await?;
        let payload = models::build_runpod_input(model, prompt, &options, &inputs);
        Ok::<_, AppError>(client.run(&endpoint_id, &payload).await?)
    }
    .await;

    match submitted {
        Ok(run) => {
            let queued = JobRepo::mark_queued(&state.pool, job.id, &run.id)
                .await?
                .unwrap_or(job);
            tracing::info!(
                job_id = queued.id,
                model_id = %queued.model_id,
                runpod_job_id = %run.id,
                user_id = %user.user_id,
                "Job submitted",
            );
            Ok(queued)
        }
        Err(e) => {
            JobRepo::fail(&state.pool, job.id, &e.to_string(), None).await?;
            tracing::warn!(job_id = job.id, error = %e, "RunPod submission failed");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Validate the request against the model catalog, create the job and
/// queue it on RunPod. Returns 201 with the queued job.
pub async fn submit_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitJob>,
) -> AppResult<impl IntoResponse> {
    let job = create_and_submit(&state, &user, &input, None).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / get / delete
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Supports `status`, `workspace_id`, `model_id`, `media_type`, `limit`
/// (default 50, max 100) and `offset`.
pub async fn list_jobs(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(status) = &params.status {
        if JobStatus::from_name(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status '{status}'")));
        }
    }
    let jobs = JobRepo::list(&state.pool, &user.user_id, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned(&state.pool, job_id, &user).await?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/jobs/{id}
pub async fn delete_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !JobRepo::delete(&state.pool, job_id, &user.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }));
    }
    tracing::info!(job_id, user_id = %user.user_id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ClearHistoryParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearHistoryResult {
    pub deleted: u64,
}

/// DELETE /api/v1/jobs?status=completed|failed
///
/// Remove finished jobs from the history. Without `status`, completed,
/// failed and cancelled jobs are all removed. Active jobs are never touched.
pub async fn clear_history(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ClearHistoryParams>,
) -> AppResult<impl IntoResponse> {
    let statuses: Vec<JobStatus> = match params.status.as_deref() {
        None => JobStatus::TERMINAL.to_vec(),
        Some(name) => match JobStatus::from_name(name) {
            Some(s) if s.is_terminal() => vec![s],
            _ => {
                return Err(AppError::BadRequest(format!(
                    "status must be one of completed, failed, cancelled; got '{name}'"
                )))
            }
        },
    };
    let deleted = JobRepo::clear_history(&state.pool, &user.user_id, &statuses).await?;
    tracing::info!(deleted, user_id = %user.user_id, "Job history cleared");
    Ok(Json(DataResponse {
        data: ClearHistoryResult { deleted },
    }))
}

// ---------------------------------------------------------------------------
// Cancel / refresh / retry
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Returns 409 if the job is already terminal. The RunPod cancel call is
/// best-effort; the job is cancelled locally either way.
pub async fn cancel_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned(&state.pool, job_id, &user).await?;

    let cancelled = JobRepo::cancel(&state.pool, job_id).await?.ok_or_else(|| {
        AppError::Core(CoreError::Conflict(
            "Job is already in a terminal state and cannot be cancelled".into(),
        ))
    })?;

    if let (Some(endpoint_id), Some(runpod_job_id)) = (&job.endpoint_id, &job.runpod_job_id) {
        let result = async {
            let client = providers::runpod_client(&state, &user.user_id).await?;
            client.cancel(endpoint_id, runpod_job_id).await?;
            Ok::<_, AppError>(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(
                job_id,
                error = %e,
                "Failed to cancel on RunPod (job already marked cancelled in DB)",
            );
        }
    }

    tracing::info!(job_id, user_id = %user.user_id, "Job cancelled");
    Ok(Json(DataResponse { data: cancelled }))
}

/// POST /api/v1/jobs/{id}/refresh
///
/// Poll RunPod for this job now instead of waiting for the poller.
pub async fn refresh_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_owned(&state.pool, job_id, &user).await?;
    if JobStatus::from_id(job.status_id).is_some_and(JobStatus::is_terminal) {
        return Ok(Json(DataResponse { data: job }));
    }
    let job = job_sync::sync_job(&state, &job).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/jobs/{id}/retry
///
/// Submit a new job with the parameters of a failed or cancelled one. The
/// new job has `retry_of_job_id` pointing to the original. This is the only
/// way to retry a job; no automatic retry exists.
pub async fn retry_job(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let original = find_owned(&state.pool, job_id, &user).await?;

    let retryable = [JobStatus::Failed.id(), JobStatus::Cancelled.id()];
    if !retryable.contains(&original.status_id) {
        return Err(AppError::Core(CoreError::Conflict(
            "Only failed or cancelled jobs can be retried".into(),
        )));
    }

    // The workspace may have been deleted since.
    let workspace_id = match original.workspace_id {
        Some(id) => WorkspaceRepo::find_for_user(&state.pool, id, &user.user_id)
            .await?
            .map(|w| w.id),
        None => None,
    };

    let input = SubmitJob {
        model_id: original.model_id.clone(),
        prompt: original.prompt.clone(),
        options: original.options.clone(),
        inputs: original.inputs(),
        workspace_id,
    };
    let new_job = create_and_submit(&state, &user, &input, Some(original.id)).await?;

    tracing::info!(
        original_job_id = job_id,
        new_job_id = new_job.id,
        user_id = %user.user_id,
        "Job retried",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: new_job })))
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/result
///
/// Streams a locally stored result (with range support), redirects to a
/// presigned URL for results in the caller's bucket, and redirects to any
/// other remote URL as-is.
pub async fn get_result(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let job = find_owned(&state.pool, job_id, &user).await?;
    let url = job
        .result_url
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} has no result")))?;

    if let Some(key) = LocalStore::key_for_url(&url) {
        return files::stream_local(&state.local_store, key, &headers).await;
    }

    if let Ok(Some(s3)) = providers::s3_storage_opt(&state, &user.user_id).await {
        if let Some(key) = s3.key_for_url(&url) {
            let signed = s3.presigned_get(key, DEFAULT_PRESIGN_TTL).await?;
            return Ok(Redirect::temporary(&signed).into_response());
        }
    }

    Ok(Redirect::temporary(&url).into_response())
}
