//! Repository for the `presets` table.

use engui_core::types::DbId;
use sqlx::PgPool;

use crate::models::preset::{CreatePreset, Preset, UpdatePreset};

const COLUMNS: &str = "id, user_id, name, model_id, description, parameters, \
     usage_count, created_at, updated_at";

/// Provides CRUD operations for generation presets.
pub struct PresetRepo;

impl PresetRepo {
    /// Insert a new preset, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        input: &CreatePreset,
    ) -> Result<Preset, sqlx::Error> {
        let query = format!(
            "INSERT INTO presets (user_id, name, model_id, description, parameters) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Preset>(&query)
            .bind(user_id)
            .bind(input.name.trim())
            .bind(&input.model_id)
            .bind(&input.description)
            .bind(&input.parameters)
            .fetch_one(pool)
            .await
    }

    /// Find a preset owned by `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Preset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM presets WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Preset>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's presets, optionally for a single model.
    ///
    /// Most used first, then by name.
    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        model_id: Option<&str>,
    ) -> Result<Vec<Preset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM presets \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR model_id = $2) \
             ORDER BY usage_count DESC, name ASC"
        );
        sqlx::query_as::<_, Preset>(&query)
            .bind(user_id)
            .bind(model_id)
            .fetch_all(pool)
            .await
    }

    /// Update a preset. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
        input: &UpdatePreset,
    ) -> Result<Option<Preset>, sqlx::Error> {
        let query = format!(
            "UPDATE presets SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                parameters = COALESCE($5, parameters) \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Preset>(&query)
            .bind(id)
            .bind(user_id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(&input.parameters)
            .fetch_optional(pool)
            .await
    }

    /// Atomically increment the usage count, returning the updated preset.
    pub async fn record_use(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Preset>, sqlx::Error> {
        let query = format!(
            "UPDATE presets SET usage_count = usage_count + 1 \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Preset>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a preset. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM presets WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
