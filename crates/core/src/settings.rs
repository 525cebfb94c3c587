//! Provider settings: known services and keys, secret handling, masking.

use crate::error::CoreError;
use crate::models;

/// RunPod serverless service.
pub const SERVICE_RUNPOD: &str = "runpod";

/// S3-compatible object storage service.
pub const SERVICE_S3: &str = "s3";

pub const VALID_SERVICES: &[&str] = &[SERVICE_RUNPOD, SERVICE_S3];

/// RunPod API key.
pub const KEY_API_KEY: &str = "api_key";

/// S3 keys.
pub const KEY_ENDPOINT_URL: &str = "endpoint_url";
pub const KEY_BUCKET: &str = "bucket";
pub const KEY_REGION: &str = "region";
pub const KEY_ACCESS_KEY_ID: &str = "access_key_id";
pub const KEY_SECRET_ACCESS_KEY: &str = "secret_access_key";
pub const KEY_FORCE_PATH_STYLE: &str = "force_path_style";

const S3_KEYS: &[&str] = &[
    KEY_ENDPOINT_URL,
    KEY_BUCKET,
    KEY_REGION,
    KEY_ACCESS_KEY_ID,
    KEY_SECRET_ACCESS_KEY,
    KEY_FORCE_PATH_STYLE,
];

/// Maximum stored value length.
pub const MAX_VALUE_LEN: usize = 2048;

/// Whether `(service, key)` holds a secret that must be encrypted at rest
/// and masked on read.
pub fn is_secret(service: &str, key: &str) -> bool {
    matches!(
        (service, key),
        (SERVICE_RUNPOD, KEY_API_KEY) | (SERVICE_S3, KEY_SECRET_ACCESS_KEY) | (SERVICE_S3, KEY_ACCESS_KEY_ID)
    )
}

/// Validate that `service` is known.
pub fn validate_service(service: &str) -> Result<(), CoreError> {
    if VALID_SERVICES.contains(&service) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown settings service '{service}'. Must be one of: {}",
            VALID_SERVICES.join(", ")
        )))
    }
}

/// Validate a `(service, key, value)` triple.
///
/// RunPod accepts the API key plus one `endpoint_*` key per catalog model.
pub fn validate_entry(service: &str, key: &str, value: &str) -> Result<(), CoreError> {
    validate_service(service)?;

    let key_ok = match service {
        SERVICE_RUNPOD => {
            key == KEY_API_KEY || models::catalog().iter().any(|m| m.endpoint_setting == key)
        }
        SERVICE_S3 => S3_KEYS.contains(&key),
        _ => false,
    };
    if !key_ok {
        return Err(CoreError::Validation(format!(
            "Unknown setting '{key}' for service '{service}'"
        )));
    }

    if value.len() > MAX_VALUE_LEN {
        return Err(CoreError::Validation(format!(
            "Setting '{service}.{key}' too long (max {MAX_VALUE_LEN} bytes)"
        )));
    }
    if key == KEY_ENDPOINT_URL && !value.is_empty() && !value.starts_with("http") {
        return Err(CoreError::Validation(
            "endpoint_url must start with http:// or https://".to_string(),
        ));
    }
    if key == KEY_FORCE_PATH_STYLE && !matches!(value, "" | "true" | "false") {
        return Err(CoreError::Validation(
            "force_path_style must be 'true' or 'false'".to_string(),
        ));
    }
    Ok(())
}

/// Mask a secret for display, keeping only the last four characters.
///
/// ```
/// use engui_core::settings::mask_secret;
///
/// assert_eq!(mask_secret("rpa_1234567890"), "••••7890");
/// assert_eq!(mask_secret("abc"), "••••");
/// ```
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "••••".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("••••{tail}")
}
