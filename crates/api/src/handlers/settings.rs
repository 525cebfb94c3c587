//! Handlers for `/settings`: per-user provider credentials and endpoints.
//!
//! Secret values are encrypted at rest with the server's [`SecretCipher`]
//! and only ever returned masked.
//!
//! [`SecretCipher`]: engui_core::crypto::SecretCipher

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_core::error::CoreError;
use engui_core::models;
use engui_core::settings::{
    is_secret, mask_secret, validate_entry, validate_service, SERVICE_RUNPOD, SERVICE_S3,
};
use engui_db::models::user_setting::{SettingView, SettingWrite, UserSetting};
use engui_db::repositories::UserSettingRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::user::CurrentUser;
use crate::providers;
use crate::response::DataResponse;
use crate::state::AppState;

/// One `(service, key, value)` entry of a settings update.
#[derive(Debug, Deserialize)]
pub struct SettingEntry {
    pub service: String,
    pub key: String,
    /// An empty value removes the key.
    pub value: String,
}

/// Request body for `PUT /settings`.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: Vec<SettingEntry>,
}

/// Display form of a stored row. Secrets are masked after decryption so the
/// tail shown is the tail of the real value.
fn view(state: &AppState, row: &UserSetting) -> AppResult<SettingView> {
    let secret = is_secret(&row.service, &row.config_key);
    let value = if secret {
        mask_secret(&providers::reveal(state, row)?)
    } else {
        row.config_value.clone()
    };
    Ok(SettingView {
        service: row.service.clone(),
        key: row.config_key.clone(),
        value,
        is_secret: secret,
        updated_at: row.updated_at,
    })
}

async fn list_views(state: &AppState, user_id: &str) -> AppResult<Vec<SettingView>> {
    UserSettingRepo::list(&state.pool, user_id)
        .await?
        .iter()
        .map(|row| view(state, row))
        .collect()
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/settings
pub async fn list_settings(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let settings = list_views(&state, &user.user_id).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /api/v1/settings
///
/// Every entry is validated before any is written. Returns the full masked
/// settings list.
pub async fn update_settings(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateSettingsRequest>,
) -> AppResult<impl IntoResponse> {
    if input.settings.is_empty() {
        return Err(AppError::BadRequest("No settings provided".into()));
    }
    for entry in &input.settings {
        validate_entry(&entry.service, &entry.key, entry.value.trim())?;
    }

    // Secrets are sealed before the transaction opens.
    let mut sealed: Vec<Option<String>> = Vec::with_capacity(input.settings.len());
    for entry in &input.settings {
        let value = entry.value.trim();
        let stored = if value.is_empty() {
            None
        } else if is_secret(&entry.service, &entry.key) {
            Some(state.cipher.encrypt(value)?)
        } else {
            Some(value.to_string())
        };
        sealed.push(stored);
    }
    let writes: Vec<SettingWrite<'_>> = input
        .settings
        .iter()
        .zip(&sealed)
        .map(|(entry, stored)| SettingWrite {
            service: &entry.service,
            key: &entry.key,
            value: stored.as_deref(),
            is_encrypted: stored.is_some() && is_secret(&entry.service, &entry.key),
        })
        .collect();
    UserSettingRepo::apply(&state.pool, &user.user_id, &writes).await?;

    tracing::info!(
        count = input.settings.len(),
        user_id = %user.user_id,
        "Settings updated",
    );
    let settings = list_views(&state, &user.user_id).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// DELETE /api/v1/settings/{service}
pub async fn delete_service_settings(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> AppResult<StatusCode> {
    validate_service(&service)?;
    let removed = UserSettingRepo::delete_service(&state.pool, &user.user_id, &service).await?;
    tracing::info!(service = %service, removed, user_id = %user.user_id, "Settings cleared");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Connection test
// ---------------------------------------------------------------------------

/// Result of probing one target (an endpoint or a bucket).
#[derive(Debug, Serialize)]
pub struct ProbeResult {
    pub target: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Response of `POST /settings/{service}/test`.
#[derive(Debug, Serialize)]
pub struct ConnectionTest {
    pub service: String,
    pub ok: bool,
    pub results: Vec<ProbeResult>,
}

/// POST /api/v1/settings/{service}/test
///
/// RunPod: calls the health route of every configured model endpoint.
/// S3: lists the bucket. Provider failures are reported in the body; only
/// missing configuration is an error response.
pub async fn test_service(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_service(&service)?;

    let results = match service.as_str() {
        SERVICE_RUNPOD => test_runpod(&state, &user.user_id).await?,
        SERVICE_S3 => {
            let s3 = providers::s3_storage(&state, &user.user_id).await?;
            let outcome = s3.check_access().await;
            vec![ProbeResult {
                target: s3.bucket().to_string(),
                ok: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            }]
        }
        _ => Vec::new(),
    };

    let ok = results.iter().all(|r| r.ok);
    tracing::info!(service = %service, ok, user_id = %user.user_id, "Settings connection test");
    Ok(Json(DataResponse {
        data: ConnectionTest {
            service,
            ok,
            results,
        },
    }))
}

async fn test_runpod(state: &AppState, user_id: &str) -> AppResult<Vec<ProbeResult>> {
    let settings = providers::service_settings(state, user_id, SERVICE_RUNPOD).await?;
    let client = providers::runpod_client_from(state, &settings)?;

    let endpoints: Vec<(&str, String)> = models::catalog()
        .iter()
        .filter_map(|m| {
            providers::endpoint_for(m, &settings)
                .ok()
                .map(|endpoint| (m.id, endpoint))
        })
        .collect();
    if endpoints.is_empty() {
        return Err(AppError::Core(CoreError::NotConfigured(
            "No RunPod endpoints configured".into(),
        )));
    }

    let mut results = Vec::with_capacity(endpoints.len());
    for (model_id, endpoint) in endpoints {
        let outcome = client.health(&endpoint).await;
        results.push(ProbeResult {
            target: format!("{model_id} ({endpoint})"),
            ok: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
        });
    }
    Ok(results)
}
