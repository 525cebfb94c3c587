//! Route definitions for `/settings`.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Routes mounted at `/settings`.
///
/// ```text
/// GET    /                    -> list_settings (secrets masked)
/// PUT    /                    -> update_settings
/// DELETE /{service}           -> delete_service_settings
/// POST   /{service}/test      -> test_service
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(settings::list_settings).put(settings::update_settings),
        )
        .route("/{service}", delete(settings::delete_service_settings))
        .route("/{service}/test", post(settings::test_service))
}
