//! Per-user provider settings rows.

use engui_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_settings` table. `config_value` holds ciphertext
/// when `is_encrypted` is set, so rows are never serialized directly.
#[derive(Debug, Clone, FromRow)]
pub struct UserSetting {
    pub id: DbId,
    pub user_id: String,
    pub service: String,
    pub config_key: String,
    pub config_value: String,
    pub is_encrypted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Display form of a setting, with secrets masked.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingView {
    pub service: String,
    pub key: String,
    pub value: String,
    pub is_secret: bool,
    pub updated_at: Timestamp,
}

/// One entry of a settings batch. `value: None` removes the key.
#[derive(Debug, Clone, Copy)]
pub struct SettingWrite<'a> {
    pub service: &'a str,
    pub key: &'a str,
    pub value: Option<&'a str>,
    pub is_encrypted: bool,
}
