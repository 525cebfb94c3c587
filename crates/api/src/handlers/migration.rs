//! `POST /storage/migrate`: copy locally stored results into the caller's
//! S3 bucket and rewrite the URLs that point at them.
//!
//! Every job and workspace media row whose result or thumbnail URL is a
//! local `/api/v1/files/...` URL is considered. Each distinct local key is
//! validated (safe key, file present), uploaded once under the same key,
//! and then every referencing row is rewritten. Objects already in the
//! bucket with the same size are not uploaded again. Local files are kept.

use std::collections::HashMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use engui_cloud::s3::S3Storage;
use engui_cloud::store::{LocalStore, MediaStore, StorageError, FILES_URL_PREFIX};
use engui_core::{mime, naming};
use engui_db::repositories::{JobRepo, WorkspaceMediaRepo};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::user::CurrentUser;
use crate::providers;
use crate::response::DataResponse;
use crate::state::AppState;

/// Maximum error messages returned in one report.
const MAX_REPORTED_ERRORS: usize = 50;

/// Request body for `POST /storage/migrate`.
#[derive(Debug, Default, Deserialize)]
pub struct MigrateRequest {
    /// Validate and count without uploading or rewriting anything.
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of a migration run. Counts are per distinct file.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub migrated: usize,
    /// Of `migrated`, how many were already in the bucket.
    pub already_present: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl MigrationReport {
    fn error(&mut self, message: String) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// What happened to one local key.
enum KeyOutcome {
    /// Uploaded (or would be, on a dry run); holds the new URL.
    Migrated(String),
    Skipped,
    Failed,
}

/// POST /api/v1/storage/migrate
pub async fn migrate_to_s3(
    user: CurrentUser,
    State(state): State<AppState>,
    body: Option<Json<MigrateRequest>>,
) -> AppResult<impl IntoResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let s3 = providers::s3_storage(&state, &user.user_id).await?;

    let jobs = JobRepo::list_with_url_prefix(&state.pool, &user.user_id, FILES_URL_PREFIX).await?;
    let media =
        WorkspaceMediaRepo::list_with_url_prefix(&state.pool, &user.user_id, FILES_URL_PREFIX)
            .await?;

    let mut report = MigrationReport {
        dry_run: request.dry_run,
        ..Default::default()
    };
    let mut outcomes: HashMap<String, KeyOutcome> = HashMap::new();

    let urls: Vec<&str> = jobs
        .iter()
        .flat_map(|j| [j.result_url.as_deref(), j.thumbnail_url.as_deref()])
        .chain(
            media
                .iter()
                .flat_map(|m| [Some(m.url.as_str()), m.thumbnail_url.as_deref()]),
        )
        .flatten()
        .collect();
    for url in urls {
        let Some(key) = LocalStore::key_for_url(url) else {
            continue;
        };
        if outcomes.contains_key(key) {
            continue;
        }
        let outcome = migrate_key(&state.local_store, &s3, key, request.dry_run, &mut report).await;
        outcomes.insert(key.to_string(), outcome);
    }

    if !request.dry_run {
        for job in &jobs {
            let result_url = rewrite(job.result_url.as_deref(), &outcomes);
            let thumbnail_url = rewrite(job.thumbnail_url.as_deref(), &outcomes);
            if result_url.as_deref() != job.result_url.as_deref()
                || thumbnail_url.as_deref() != job.thumbnail_url.as_deref()
            {
                JobRepo::update_urls(
                    &state.pool,
                    job.id,
                    result_url.as_deref(),
                    thumbnail_url.as_deref(),
                )
                .await?;
            }
        }
        for item in &media {
            let url = rewrite(Some(&item.url), &outcomes).unwrap_or_else(|| item.url.clone());
            let thumbnail_url = rewrite(item.thumbnail_url.as_deref(), &outcomes);
            if url != item.url || thumbnail_url.as_deref() != item.thumbnail_url.as_deref() {
                WorkspaceMediaRepo::update_urls(&state.pool, item.id, &url, thumbnail_url.as_deref())
                    .await?;
            }
        }
    }

    tracing::info!(
        user_id = %user.user_id,
        dry_run = report.dry_run,
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "Storage migration finished",
    );
    Ok(Json(DataResponse { data: report }))
}

async fn migrate_key(
    local: &LocalStore,
    s3: &S3Storage,
    key: &str,
    dry_run: bool,
    report: &mut MigrationReport,
) -> KeyOutcome {
    if !naming::is_safe_key(key) {
        report.error(format!("{key}: invalid storage key"));
        return KeyOutcome::Failed;
    }

    let path = match local.path_for(key) {
        Ok(path) => path,
        Err(e) => {
            report.error(format!("{key}: {e}"));
            return KeyOutcome::Failed;
        }
    };
    if dry_run {
        return match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                report.migrated += 1;
                KeyOutcome::Migrated(s3.object_url(key))
            }
            Ok(false) => {
                report.skipped += 1;
                KeyOutcome::Skipped
            }
            Err(e) => {
                report.error(format!("{key}: {e}"));
                KeyOutcome::Failed
            }
        };
    }

    let bytes = match local.read(key).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(_)) => {
            tracing::debug!(key, "Local file missing, skipping");
            report.skipped += 1;
            return KeyOutcome::Skipped;
        }
        Err(e) => {
            report.error(format!("{key}: {e}"));
            return KeyOutcome::Failed;
        }
    };

    match s3.head_object(key).await {
        Ok(Some(existing)) if existing.size == bytes.len() as i64 => {
            tracing::debug!(key, size = existing.size, "Object already in bucket, not uploading");
            report.migrated += 1;
            report.already_present += 1;
            return KeyOutcome::Migrated(s3.object_url(key));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(key, error = %e, "Could not check bucket for existing object"),
    }

    match s3.put(key, bytes, mime::mime_for_path(key)).await {
        Ok(stored) => {
            report.migrated += 1;
            KeyOutcome::Migrated(stored.url)
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to upload local file to S3");
            report.error(format!("{key}: {e}"));
            KeyOutcome::Failed
        }
    }
}

/// New URL for `url` if its key was migrated, the original otherwise.
fn rewrite(url: Option<&str>, outcomes: &HashMap<String, KeyOutcome>) -> Option<String> {
    let url = url?;
    match LocalStore::key_for_url(url).and_then(|key| outcomes.get(key)) {
        Some(KeyOutcome::Migrated(new_url)) => Some(new_url.clone()),
        _ => Some(url.to_string()),
    }
}
