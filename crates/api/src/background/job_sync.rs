//! Applying RunPod job status to the `jobs` table.
//!
//! Used by the background poller for every active job and by
//! `POST /jobs/{id}/refresh` for a single job. On completion the output is
//! persisted to the user's result store, a workspace media entry is created
//! and the job is charged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use engui_cloud::runpod::{extract_output, RunPodClient, RunPodOutput, RunPodStatus, StatusResponse};
use engui_cloud::store::MediaStore;
use engui_core::credits;
use engui_core::ffmpeg::{self, FramePosition};
use engui_core::media::{self, MediaType};
use engui_core::{mime, models, naming};
use engui_db::models::job::{Job, JobCompletion};
use engui_db::models::status::JobStatus;
use engui_db::models::workspace::CreateWorkspaceMedia;
use engui_db::repositories::{CreditRepo, JobRepo, WorkspaceMediaRepo, WorkspaceRepo};

use crate::error::{AppError, AppResult};
use crate::providers;
use crate::state::AppState;

/// Width of thumbnails extracted from generated videos.
const THUMBNAIL_WIDTH: u32 = 512;

/// Directory under the storage root for scratch files.
const SCRATCH_DIR: &str = "tmp";

/// Job status corresponding to a RunPod status. `None` for statuses this
/// service does not recognise, which leave the job untouched.
pub fn job_status_for(status: RunPodStatus) -> Option<JobStatus> {
    match status {
        RunPodStatus::InQueue => Some(JobStatus::Queued),
        RunPodStatus::InProgress => Some(JobStatus::Processing),
        RunPodStatus::Completed => Some(JobStatus::Completed),
        RunPodStatus::Failed | RunPodStatus::TimedOut => Some(JobStatus::Failed),
        RunPodStatus::Cancelled => Some(JobStatus::Cancelled),
        RunPodStatus::Unknown => None,
    }
}

/// Poll RunPod once for `job` and apply the result. Returns the job as
/// stored afterwards.
pub async fn sync_job(state: &AppState, job: &Job) -> AppResult<Job> {
    let (Some(endpoint_id), Some(runpod_job_id)) = (&job.endpoint_id, &job.runpod_job_id) else {
        return Err(AppError::BadRequest(format!(
            "Job {} has not been submitted to RunPod",
            job.id
        )));
    };

    let client = providers::runpod_client(state, &job.user_id).await?;
    let status = client.status(endpoint_id, runpod_job_id).await?;
    apply_status(state, &client, job, &status).await?;

    Ok(JobRepo::find_by_id(&state.pool, job.id)
        .await?
        .unwrap_or_else(|| job.clone()))
}

/// Apply a RunPod status response to a job.
pub async fn apply_status(
    state: &AppState,
    client: &RunPodClient,
    job: &Job,
    status: &StatusResponse,
) -> AppResult<()> {
    match job_status_for(status.status) {
        Some(next @ (JobStatus::Queued | JobStatus::Processing)) => {
            if JobRepo::set_status(&state.pool, job.id, next).await? {
                tracing::debug!(job_id = job.id, status = next.name(), "Job status updated");
            }
        }
        Some(JobStatus::Completed) => complete_job(state, client, job, status).await?,
        Some(JobStatus::Failed) => {
            let message = status
                .error_message()
                .unwrap_or_else(|| format!("RunPod reported {:?}", status.status));
            if JobRepo::fail(&state.pool, job.id, &message, status.execution_time_ms)
                .await?
                .is_some()
            {
                tracing::warn!(job_id = job.id, error = %message, "Job failed");
            }
        }
        Some(JobStatus::Cancelled) => {
            if JobRepo::cancel(&state.pool, job.id).await?.is_some() {
                tracing::info!(job_id = job.id, "Job cancelled on RunPod");
            }
        }
        Some(JobStatus::Pending) | None => {
            tracing::debug!(job_id = job.id, status = ?status.status, "Ignoring RunPod status");
        }
    }
    Ok(())
}

/// Metadata of a persisted job result.
#[derive(Debug, Default)]
struct PersistedResult {
    url: String,
    thumbnail_url: Option<String>,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<i64>,
    width: Option<i32>,
    height: Option<i32>,
    duration_secs: Option<f64>,
}

async fn complete_job(
    state: &AppState,
    client: &RunPodClient,
    job: &Job,
    status: &StatusResponse,
) -> AppResult<()> {
    let Some(output) = status.output.as_ref().and_then(extract_output) else {
        JobRepo::fail(
            &state.pool,
            job.id,
            "RunPod completed without a usable output",
            status.execution_time_ms,
        )
        .await?;
        tracing::warn!(job_id = job.id, output = ?status.output, "No artifact in RunPod output");
        return Ok(());
    };

    let media_type = MediaType::parse(&job.media_type)?;
    let store = providers::result_store(state, &job.user_id).await?;
    let persisted = match persist_output(state, client, store, job, media_type, output).await {
        Ok(p) => p,
        Err(e) => {
            let message = format!("Failed to store result: {e}");
            JobRepo::fail(&state.pool, job.id, &message, status.execution_time_ms).await?;
            tracing::error!(job_id = job.id, error = %e, "Result persistence failed");
            return Ok(());
        }
    };

    let cost = status
        .execution_time_ms
        .zip(models::find_model(&job.model_id))
        .map(|(ms, model)| models::job_cost(model, ms));

    let completion = JobCompletion {
        result_url: Some(persisted.url.clone()),
        thumbnail_url: persisted.thumbnail_url.clone(),
        execution_time_ms: status.execution_time_ms,
        delay_time_ms: status.delay_time_ms,
        cost,
    };
    let Some(done) = JobRepo::complete(&state.pool, job.id, &completion).await? else {
        // Cancelled or finished by another path in the meantime.
        tracing::info!(job_id = job.id, "Job already terminal, discarding result");
        return Ok(());
    };
    tracing::info!(
        job_id = done.id,
        result_url = %persisted.url,
        execution_time_ms = ?done.execution_time_ms,
        "Job completed"
    );

    let workspace_id = match done.workspace_id {
        Some(id) => id,
        None => WorkspaceRepo::get_or_create_default(&state.pool, &done.user_id).await?.id,
    };
    let media = CreateWorkspaceMedia {
        job_id: Some(done.id),
        media_type: done.media_type.clone(),
        url: persisted.url,
        thumbnail_url: persisted.thumbnail_url,
        file_name: persisted.file_name,
        mime_type: persisted.mime_type,
        file_size: persisted.file_size,
        width: persisted.width,
        height: persisted.height,
        duration_secs: persisted.duration_secs,
        prompt: done.prompt.clone(),
        model_id: Some(done.model_id.clone()),
    };
    WorkspaceMediaRepo::create_for_job(&state.pool, workspace_id, &media).await?;

    if let Some(cost) = cost.filter(|c| *c > 0.0) {
        let secs = done.execution_time_ms.unwrap_or(0) as f64 / 1000.0;
        let description = format!("{} generation ({secs:.1}s)", done.model_id);
        if let Some(charge) =
            CreditRepo::record_job_charge(&state.pool, &done.user_id, done.id, cost, &description)
                .await?
        {
            tracing::debug!(
                job_id = done.id,
                amount = charge.amount,
                activity = credits::ACTIVITY_JOB_CHARGE,
                "Job charged"
            );
        }
    }
    Ok(())
}

/// Download or decode the artifact and write it to `store`.
///
/// A worker URL that cannot be downloaded is kept as the result URL so the
/// job still completes.
async fn persist_output(
    state: &AppState,
    client: &RunPodClient,
    store: Arc<dyn MediaStore>,
    job: &Job,
    media_type: MediaType,
    output: RunPodOutput,
) -> AppResult<PersistedResult> {
    let (bytes, ext) = match output {
        RunPodOutput::Url(url) => match client.download(&url).await {
            Ok(bytes) => {
                let ext = url
                    .split(['?', '#'])
                    .next()
                    .and_then(mime::extension_of)
                    .filter(|e| mime::mime_for_extension(e).is_some());
                (bytes, ext)
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, url = %url, error = %e, "Result download failed, keeping remote URL");
                return Ok(PersistedResult {
                    url,
                    ..Default::default()
                });
            }
        },
        RunPodOutput::Base64 { data, ext } => {
            let bytes = RunPodOutput::decode_base64(&data)
                .map_err(|e| AppError::BadRequest(format!("Invalid base64 output: {e}")))?;
            (bytes, ext)
        }
    };

    let ext = ext.unwrap_or_else(|| default_extension(media_type).to_string());
    let file_name = naming::result_file_name(job.id, &ext, Utc::now());
    let key = naming::result_key(&job.user_id, &file_name);
    let content_type = mime::mime_for_path(&file_name);

    let mut result = PersistedResult {
        file_name: Some(file_name.clone()),
        mime_type: Some(content_type.to_string()),
        file_size: Some(bytes.len() as i64),
        ..Default::default()
    };

    match media_type {
        MediaType::Image => {
            if let Some(dims) = media::image_dimensions(&bytes) {
                result.width = Some(dims.width as i32);
                result.height = Some(dims.height as i32);
            }
        }
        MediaType::Video | MediaType::Audio => {
            let scratch = scratch_path(state, &ext);
            if let Err(e) = write_scratch(&scratch, &bytes).await {
                tracing::warn!(job_id = job.id, error = %e, "Could not write scratch copy");
            } else {
                describe_media(state, &store, job, media_type, &scratch, &file_name, &mut result)
                    .await;
                let _ = tokio::fs::remove_file(&scratch).await;
            }
        }
    }

    let stored = store.put(&key, bytes, content_type).await?;
    result.url = stored.url;
    Ok(result)
}

/// Best-effort probe and thumbnail for video/audio results.
async fn describe_media(
    state: &AppState,
    store: &Arc<dyn MediaStore>,
    job: &Job,
    media_type: MediaType,
    path: &Path,
    file_name: &str,
    result: &mut PersistedResult,
) {
    match ffmpeg::probe_media(path).await {
        Ok(probe) => {
            result.duration_secs = Some(probe.duration_secs).filter(|d| *d > 0.0);
            if media_type == MediaType::Video {
                result.width = Some(probe.width).filter(|w| *w > 0);
                result.height = Some(probe.height).filter(|h| *h > 0);
            }
        }
        Err(e) => tracing::warn!(job_id = job.id, error = %e, "ffprobe failed on result"),
    }

    if media_type != MediaType::Video {
        return;
    }
    let frame = scratch_path(state, "jpg");
    match ffmpeg::extract_frame_at(path, &frame, FramePosition::First, Some(THUMBNAIL_WIDTH)).await {
        Ok(_) => match tokio::fs::read(&frame).await {
            Ok(bytes) => {
                let key = naming::thumbnail_key(&job.user_id, file_name, "thumb", "jpg");
                match store.put(&key, bytes, "image/jpeg").await {
                    Ok(stored) => result.thumbnail_url = Some(stored.url),
                    Err(e) => tracing::warn!(job_id = job.id, error = %e, "Thumbnail upload failed"),
                }
            }
            Err(e) => tracing::warn!(job_id = job.id, error = %e, "Thumbnail read failed"),
        },
        Err(e) => tracing::warn!(job_id = job.id, error = %e, "Thumbnail extraction failed"),
    }
    let _ = tokio::fs::remove_file(&frame).await;
}

fn default_extension(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "png",
        MediaType::Video => "mp4",
        MediaType::Audio => "wav",
    }
}

/// Unique scratch file path under `{STORAGE_DIR}/tmp`.
pub(crate) fn scratch_path(state: &AppState, ext: &str) -> PathBuf {
    state
        .config
        .storage_dir
        .join(SCRATCH_DIR)
        .join(format!("{}.{ext}", uuid::Uuid::new_v4().simple()))
}

async fn write_scratch(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
