//! Preset validation.
//!
//! A preset is a named set of generation options saved for one model.

use serde_json::Value;

use crate::error::CoreError;
use crate::models;

/// Maximum length for a preset name.
pub const MAX_PRESET_NAME_LEN: usize = 200;

/// Maximum length for a description.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Validate a preset name: non-empty and within length limit.
pub fn validate_preset_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Preset name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_PRESET_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Preset name too long: {} chars (max {MAX_PRESET_NAME_LEN})",
            name.len()
        )));
    }
    Ok(())
}

/// Validate an optional description.
pub fn validate_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.len() > MAX_DESCRIPTION_LEN => Err(CoreError::Validation(format!(
            "Description too long: {} chars (max {MAX_DESCRIPTION_LEN})",
            d.len()
        ))),
        _ => Ok(()),
    }
}

/// Validate preset parameters against the target model.
///
/// Parameters are generation options, so they follow the same option rules
/// as a submission; prompt and input requirements do not apply.
pub fn validate_parameters(model_id: &str, parameters: &Value) -> Result<(), CoreError> {
    let model = models::require_model(model_id)?;
    if !parameters.is_object() {
        return Err(CoreError::Validation(
            "Preset parameters must be a JSON object".to_string(),
        ));
    }
    let relaxed = models::ModelSpec {
        requires_prompt: false,
        inputs: &[],
        ..model.clone()
    };
    models::validate_generation(&relaxed, None, &models::InputFiles::default(), parameters)
}
