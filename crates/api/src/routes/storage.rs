//! Route definitions for `/storage`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{migration, storage};
use crate::state::AppState;

/// Routes mounted at `/storage`.
///
/// ```text
/// GET    /objects         -> list_objects (?prefix)
/// POST   /objects         -> upload_object (multipart)
/// DELETE /objects         -> delete_object (?key)
/// GET    /presign         -> presign (?key, method, expires_in)
/// POST   /migrate         -> migrate_to_s3
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/objects",
            get(storage::list_objects)
                .post(storage::upload_object)
                .delete(storage::delete_object),
        )
        .route("/presign", get(storage::presign))
        .route("/migrate", post(migration::migrate_to_s3))
}
