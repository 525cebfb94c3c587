//! Per-user provider resolution.
//!
//! RunPod and S3 clients are built per request from the caller's stored
//! settings (secrets decrypted on the way out). The server-wide
//! `RUNPOD_API_KEY` is used only when the user has no key of their own.

use std::collections::HashMap;
use std::sync::Arc;

use engui_cloud::runpod::RunPodClient;
use engui_cloud::s3::{S3Settings, S3Storage};
use engui_cloud::store::MediaStore;
use engui_core::error::CoreError;
use engui_core::models::ModelSpec;
use engui_core::settings::{KEY_API_KEY, KEY_BUCKET, SERVICE_RUNPOD, SERVICE_S3};
use engui_db::models::user_setting::UserSetting;
use engui_db::repositories::UserSettingRepo;

use crate::error::AppResult;
use crate::state::AppState;

/// Decrypt a stored setting value.
pub fn reveal(state: &AppState, setting: &UserSetting) -> AppResult<String> {
    if setting.is_encrypted {
        Ok(state.cipher.decrypt(&setting.config_value)?)
    } else {
        Ok(setting.config_value.clone())
    }
}

/// Decrypted settings of one service, keyed by config key.
pub async fn service_settings(
    state: &AppState,
    user_id: &str,
    service: &str,
) -> AppResult<HashMap<String, String>> {
    let rows = UserSettingRepo::list_for_service(&state.pool, user_id, service).await?;
    rows.iter()
        .map(|row| Ok((row.config_key.clone(), reveal(state, row)?)))
        .collect()
}

/// Build a RunPod client for `user_id`.
pub async fn runpod_client(state: &AppState, user_id: &str) -> AppResult<RunPodClient> {
    let settings = service_settings(state, user_id, SERVICE_RUNPOD).await?;
    runpod_client_from(state, &settings)
}

/// Build a RunPod client from already-loaded `runpod` settings.
pub fn runpod_client_from(
    state: &AppState,
    settings: &HashMap<String, String>,
) -> AppResult<RunPodClient> {
    let api_key = settings
        .get(KEY_API_KEY)
        .filter(|k| !k.trim().is_empty())
        .cloned()
        .or_else(|| state.config.runpod_api_key.clone())
        .ok_or_else(|| CoreError::NotConfigured("RunPod API key is not configured".into()))?;

    Ok(RunPodClient::with_client(
        state.http.clone(),
        &state.config.runpod_api_base,
        &api_key,
    )?)
}

/// Endpoint id configured for `model` in already-loaded `runpod` settings.
pub fn endpoint_for(model: &ModelSpec, settings: &HashMap<String, String>) -> AppResult<String> {
    settings
        .get(model.endpoint_setting)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            CoreError::NotConfigured(format!(
                "No RunPod endpoint configured for model '{}' (setting runpod.{})",
                model.id, model.endpoint_setting
            ))
            .into()
        })
}

/// Build the caller's S3 client, or fail with `NOT_CONFIGURED`.
pub async fn s3_storage(state: &AppState, user_id: &str) -> AppResult<S3Storage> {
    let settings = service_settings(state, user_id, SERVICE_S3).await?;
    Ok(S3Storage::new(S3Settings::from_map(&settings)?))
}

/// The caller's S3 client if they configured a bucket at all.
///
/// A bucket with incomplete credentials is still an error, so a typo in
/// the settings is not silently ignored.
pub async fn s3_storage_opt(state: &AppState, user_id: &str) -> AppResult<Option<S3Storage>> {
    let settings = service_settings(state, user_id, SERVICE_S3).await?;
    if !settings.contains_key(KEY_BUCKET) {
        return Ok(None);
    }
    Ok(Some(S3Storage::new(S3Settings::from_map(&settings)?)))
}

/// Where generated results for `user_id` are written: their S3 bucket when
/// configured, the local store otherwise.
pub async fn result_store(state: &AppState, user_id: &str) -> AppResult<Arc<dyn MediaStore>> {
    let store: Arc<dyn MediaStore> = match s3_storage_opt(state, user_id).await {
        Ok(Some(s3)) => Arc::new(s3),
        Ok(None) => state.local_store.clone(),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "S3 settings unusable, storing results locally");
            state.local_store.clone()
        }
    };
    Ok(store)
}
