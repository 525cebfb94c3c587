//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs (?status, limit, offset)
/// POST   /                -> submit_job
/// DELETE /                -> clear_history (?status)
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> delete_job
/// POST   /{id}/cancel     -> cancel_job
/// POST   /{id}/refresh    -> refresh_job
/// POST   /{id}/retry      -> retry_job
/// GET    /{id}/result     -> get_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(jobs::list_jobs)
                .post(jobs::submit_job)
                .delete(jobs::clear_history),
        )
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/refresh", post(jobs::refresh_job))
        .route("/{id}/retry", post(jobs::retry_job))
        .route("/{id}/result", get(jobs::get_result))
}
