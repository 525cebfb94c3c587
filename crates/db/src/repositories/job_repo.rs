//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! Transitions into a terminal status are guarded so a job that already
//! finished (or was cancelled) is never overwritten by a late poll.

use engui_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobCompletion, JobListQuery, NewJob};
use crate::models::status::{JobStatus, StatusId};
use crate::{clamp_limit, clamp_offset};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, user_id, workspace_id, model_id, media_type, status_id, status, \
    endpoint_id, runpod_job_id, prompt, options, input_files, \
    result_url, thumbnail_url, error_message, \
    execution_time_ms, delay_time_ms, cost, retry_of_job_id, \
    submitted_at, completed_at, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Statuses a job never leaves, bound as `SMALLINT[]`.
static TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Completed as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::Cancelled as StatusId,
];

/// Provides CRUD operations and status transitions for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn create(pool: &PgPool, input: &NewJob<'_>) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (user_id, workspace_id, model_id, media_type, status_id, endpoint_id, \
                  prompt, options, input_files, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.user_id)
            .bind(input.workspace_id)
            .bind(input.model_id)
            .bind(input.media_type)
            .bind(JobStatus::Pending.id())
            .bind(input.endpoint_id)
            .bind(input.prompt)
            .bind(input.options)
            .bind(input.input_files)
            .bind(input.retry_of_job_id)
            .fetch_one(pool)
            .await
    }

    /// Record the RunPod job id after a successful `run` call and mark the
    /// job queued.
    pub async fn mark_queued(
        pool: &PgPool,
        id: DbId,
        runpod_job_id: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET runpod_job_id = $2, status_id = $3 \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(runpod_job_id)
            .bind(JobStatus::Queued.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Move a non-terminal job to `status` (queued or processing).
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: JobStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2 \
             WHERE id = $1 AND status_id <> $2 AND status_id <> ALL($3)",
        )
        .bind(id)
        .bind(status.id())
        .bind(&TERMINAL_STATUSES[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job completed with its persisted result.
    ///
    /// Returns `None` if the job is missing or already terminal.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        completion: &JobCompletion,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, result_url = $3, thumbnail_url = $4, \
                 execution_time_ms = $5, delay_time_ms = $6, cost = $7, \
                 error_message = NULL, completed_at = NOW() \
             WHERE id = $1 AND status_id <> ALL($8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Completed.id())
            .bind(&completion.result_url)
            .bind(&completion.thumbnail_url)
            .bind(completion.execution_time_ms)
            .bind(completion.delay_time_ms)
            .bind(completion.cost)
            .bind(&TERMINAL_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Mark a job failed with an error message.
    ///
    /// No automatic retry is performed. The job stays failed until the user
    /// retries it via `POST /jobs/{id}/retry`.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error: &str,
        execution_time_ms: Option<i64>,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 execution_time_ms = COALESCE($4, execution_time_ms), \
                 completed_at = NOW() \
             WHERE id = $1 AND status_id <> ALL($5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Failed.id())
            .bind(error)
            .bind(execution_time_ms)
            .bind(&TERMINAL_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Cancel a job unless it already finished. `None` for terminal jobs.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id <> ALL($3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::Cancelled.id())
            .bind(&TERMINAL_STATUSES[..])
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its ID, regardless of owner.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job owned by `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's jobs, newest first, with optional filters.
    ///
    /// `params.status` is matched against the status name; callers validate
    /// it beforehand.
    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = vec!["user_id = $1".to_string()];
        let mut bind_idx: u32 = 2;

        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.workspace_id.is_some() {
            conditions.push(format!("workspace_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.model_id.is_some() {
            conditions.push(format!("model_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.media_type.is_some() {
            conditions.push(format!("media_type = ${bind_idx}"));
            bind_idx += 1;
        }

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE {} \
             ORDER BY submitted_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            conditions.join(" AND "),
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, Job>(&query).bind(user_id);
        if let Some(status) = &params.status {
            q = q.bind(status);
        }
        if let Some(workspace_id) = params.workspace_id {
            q = q.bind(workspace_id);
        }
        if let Some(model_id) = &params.model_id {
            q = q.bind(model_id);
        }
        if let Some(media_type) = &params.media_type {
            q = q.bind(media_type);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Jobs the background poller should check: queued or processing with a
    /// RunPod id, oldest first.
    pub async fn list_active(pool: &PgPool, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id IN ($1, $2) AND runpod_job_id IS NOT NULL \
             ORDER BY submitted_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::ACTIVE[0].id())
            .bind(JobStatus::ACTIVE[1].id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Delete a user's job. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all of a user's jobs in the given statuses. Returns the count.
    pub async fn clear_history(
        pool: &PgPool,
        user_id: &str,
        statuses: &[JobStatus],
    ) -> Result<u64, sqlx::Error> {
        let ids: Vec<StatusId> = statuses.iter().map(|s| s.id()).collect();
        let result = sqlx::query("DELETE FROM jobs WHERE user_id = $1 AND status_id = ANY($2)")
            .bind(user_id)
            .bind(&ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// A user's jobs whose result or thumbnail URL starts with `url_prefix`.
    pub async fn list_with_url_prefix(
        pool: &PgPool,
        user_id: &str,
        url_prefix: &str,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE user_id = $1 \
               AND (starts_with(result_url, $2) OR starts_with(thumbnail_url, $2)) \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(user_id)
            .bind(url_prefix)
            .fetch_all(pool)
            .await
    }

    /// Replace the stored result and thumbnail URLs.
    pub async fn update_urls(
        pool: &PgPool,
        id: DbId,
        result_url: Option<&str>,
        thumbnail_url: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE jobs SET result_url = $2, thumbnail_url = $3 WHERE id = $1")
            .bind(id)
            .bind(result_url)
            .bind(thumbnail_url)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
