//! Preset models and DTOs.

use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `presets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Preset {
    pub id: DbId,
    pub user_id: String,
    pub name: String,
    pub model_id: String,
    pub description: Option<String>,
    pub parameters: serde_json::Value,
    pub usage_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new preset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePreset {
    pub name: String,
    pub model_id: String,
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub parameters: serde_json::Value,
}

/// DTO for updating an existing preset. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePreset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<serde_json::Value>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
