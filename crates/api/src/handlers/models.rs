//! Handler for `GET /models`.

use axum::response::IntoResponse;
use axum::Json;
use engui_core::models;

use crate::response::DataResponse;

/// GET /api/v1/models
pub async fn list_models() -> impl IntoResponse {
    Json(DataResponse {
        data: models::catalog(),
    })
}
