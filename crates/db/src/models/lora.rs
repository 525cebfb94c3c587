//! LoRA weight file models and DTOs.

use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `loras` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lora {
    pub id: DbId,
    pub user_id: String,
    pub name: String,
    pub file_name: String,
    pub storage_key: String,
    pub file_size: i64,
    pub model_family: Option<String>,
    pub trigger_words: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Row values for inserting or re-registering a LoRA.
#[derive(Debug, Clone)]
pub struct NewLora {
    pub name: String,
    pub file_name: String,
    pub storage_key: String,
    pub file_size: i64,
    pub model_family: Option<String>,
    pub trigger_words: Option<String>,
}

/// DTO for editing LoRA metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLora {
    pub name: Option<String>,
    pub model_family: Option<String>,
    pub trigger_words: Option<String>,
}
