//! Route definitions for the `/workspaces` resource.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::workspaces;
use crate::state::AppState;

/// Routes mounted at `/workspaces`.
///
/// ```text
/// GET    /                          -> list_workspaces
/// POST   /                          -> create_workspace
/// GET    /{id}                      -> get_workspace
/// PUT    /{id}                      -> update_workspace
/// DELETE /{id}                      -> delete_workspace
/// POST   /{id}/default              -> set_default_workspace
/// GET    /{id}/media                -> list_media (?media_type, favorites_only, limit, offset)
/// POST   /{id}/media                -> add_media
/// PATCH  /{id}/media/{media_id}     -> update_media
/// DELETE /{id}/media/{media_id}     -> delete_media
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route(
            "/{id}",
            get(workspaces::get_workspace)
                .put(workspaces::update_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route("/{id}/default", post(workspaces::set_default_workspace))
        .route(
            "/{id}/media",
            get(workspaces::list_media).post(workspaces::add_media),
        )
        .route(
            "/{id}/media/{media_id}",
            patch(workspaces::update_media).delete(workspaces::delete_media),
        )
}
