//! Route definitions for `/credits`.

use axum::routing::get;
use axum::Router;

use crate::handlers::credits;
use crate::state::AppState;

/// Routes mounted at `/credits`.
///
/// ```text
/// GET    /                -> list_activities (?limit, offset)
/// POST   /                -> record_activity
/// GET    /summary         -> get_summary
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(credits::list_activities).post(credits::record_activity),
        )
        .route("/summary", get(credits::get_summary))
}
