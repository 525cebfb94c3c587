//! Route definitions for uploads, local file serving and media tools.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{files, media, uploads};
use crate::state::AppState;

/// Routes mounted at `/uploads`.
///
/// ```text
/// POST   /                -> upload_file (multipart)
/// ```
pub fn uploads_router() -> Router<AppState> {
    Router::new().route("/", post(uploads::upload_file))
}

/// Routes mounted at `/files`.
///
/// ```text
/// GET    /{*path}         -> serve_file (range requests)
/// ```
pub fn files_router() -> Router<AppState> {
    Router::new().route("/{*path}", get(files::serve_file))
}

/// Routes mounted at `/media`.
///
/// ```text
/// POST   /frames          -> extract_frame
/// POST   /probe           -> probe_media
/// ```
pub fn media_router() -> Router<AppState> {
    Router::new()
        .route("/frames", post(media::extract_frame))
        .route("/probe", post(media::probe_media))
}
