//! Route definitions for `/video-projects`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::video_projects;
use crate::state::AppState;

/// Routes mounted at `/video-projects`.
///
/// ```text
/// GET    /                -> list_projects (?limit, offset)
/// POST   /                -> create_project
/// POST   /import          -> import_project
/// GET    /{id}            -> get_project
/// PUT    /{id}            -> update_project
/// DELETE /{id}            -> delete_project
/// GET    /{id}/export     -> export_project
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(video_projects::list_projects).post(video_projects::create_project),
        )
        .route("/import", post(video_projects::import_project))
        .route(
            "/{id}",
            get(video_projects::get_project)
                .put(video_projects::update_project)
                .delete(video_projects::delete_project),
        )
        .route("/{id}/export", get(video_projects::export_project))
}
