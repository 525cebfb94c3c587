use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Payload of `GET /health`.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when both the database and the media store are usable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// The local media root exists (or could be created).
    pub storage_healthy: bool,
    /// A server-wide RunPod key is set; per-user keys are not consulted.
    pub runpod_key_configured: bool,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = engui_db::health_check(&state.pool).await.is_ok();

    let root = state.local_store.root();
    let storage_healthy = match tokio::fs::create_dir_all(root).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Media store root unusable");
            false
        }
    };

    Json(HealthResponse {
        status: if db_healthy && storage_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        storage_healthy,
        runpod_key_configured: state.config.runpod_api_key.is_some(),
    })
}

/// Root-level routes, mounted outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
