//! Route definitions for the `/loras` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::loras;
use crate::state::AppState;

/// Routes mounted at `/loras`.
///
/// ```text
/// GET    /                -> list_loras
/// POST   /                -> upload_lora (multipart, up to 2 GiB)
/// POST   /sync            -> sync_loras
/// GET    /{id}            -> get_lora
/// PUT    /{id}            -> update_lora
/// DELETE /{id}            -> delete_lora
/// GET    /{id}/url        -> lora_url
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(loras::list_loras)
                .post(loras::upload_lora)
                .layer(DefaultBodyLimit::max(loras::MAX_LORA_BYTES)),
        )
        .route("/sync", post(loras::sync_loras))
        .route(
            "/{id}",
            get(loras::get_lora)
                .put(loras::update_lora)
                .delete(loras::delete_lora),
        )
        .route("/{id}/url", get(loras::lora_url))
}
