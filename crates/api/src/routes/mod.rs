pub mod credits;
pub mod health;
pub mod jobs;
pub mod loras;
pub mod media;
pub mod presets;
pub mod settings;
pub mod storage;
pub mod video_projects;
pub mod workspaces;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /models                                          model catalog (GET)
///
/// /jobs                                            list, submit, clear history
/// /jobs/{id}                                       get, delete
/// /jobs/{id}/cancel                                cancel (POST)
/// /jobs/{id}/refresh                               poll RunPod now (POST)
/// /jobs/{id}/retry                                 resubmit (POST)
/// /jobs/{id}/result                                result download (GET)
///
/// /presets                                         list (?model_id), create
/// /presets/{id}                                    get, update, delete
/// /presets/{id}/use                                record use (POST)
///
/// /workspaces                                      list, create
/// /workspaces/{id}                                 get, update, delete
/// /workspaces/{id}/default                         make default (POST)
/// /workspaces/{id}/media                           list, add
/// /workspaces/{id}/media/{media_id}                favorite/move (PATCH), delete
///
/// /loras                                           list, upload (multipart)
/// /loras/sync                                      reconcile with bucket (POST)
/// /loras/{id}                                      get, update, delete
/// /loras/{id}/url                                  presigned download (GET)
///
/// /settings                                        list (masked), upsert (PUT)
/// /settings/{service}                              clear service (DELETE)
/// /settings/{service}/test                         connection test (POST)
///
/// /credits                                         list, record
/// /credits/summary                                 balance and totals
///
/// /storage/objects                                 list, upload, delete
/// /storage/presign                                 presigned URL (GET)
/// /storage/migrate                                 local results to S3 (POST)
///
/// /uploads                                         input media (multipart)
/// /files/{*path}                                   local files (GET, range)
/// /media/frames                                    extract a video frame (POST)
/// /media/probe                                     ffprobe summary (POST)
///
/// /video-projects                                  list, create
/// /video-projects/import                           import (POST)
/// /video-projects/{id}                             get, update, delete
/// /video-projects/{id}/export                      export download (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/models", get(handlers::models::list_models))
        // Generation jobs and their RunPod lifecycle.
        .nest("/jobs", jobs::router())
        .nest("/presets", presets::router())
        // Workspaces and the media saved into them.
        .nest("/workspaces", workspaces::router())
        .nest("/loras", loras::router())
        // Provider credentials and endpoints.
        .nest("/settings", settings::router())
        .nest("/credits", credits::router())
        // Direct bucket access and local-to-S3 migration.
        .nest("/storage", storage::router())
        // Input uploads, local file serving, frame extraction.
        .nest("/uploads", media::uploads_router())
        .nest("/files", media::files_router())
        .nest("/media", media::media_router())
        .nest("/video-projects", video_projects::router())
}
