//! Route definitions for the `/presets` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::presets;
use crate::state::AppState;

/// Routes mounted at `/presets`.
///
/// ```text
/// GET    /                -> list_presets (?model_id)
/// POST   /                -> create_preset
/// GET    /{id}            -> get_preset
/// PUT    /{id}            -> update_preset
/// DELETE /{id}            -> delete_preset
/// POST   /{id}/use        -> use_preset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(presets::list_presets).post(presets::create_preset))
        .route(
            "/{id}",
            get(presets::get_preset)
                .put(presets::update_preset)
                .delete(presets::delete_preset),
        )
        .route("/{id}/use", post(presets::use_preset))
}
