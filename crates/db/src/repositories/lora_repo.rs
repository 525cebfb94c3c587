//! Repository for the `loras` table.

use engui_core::types::DbId;
use sqlx::PgPool;

use crate::models::lora::{Lora, NewLora, UpdateLora};

const COLUMNS: &str = "id, user_id, name, file_name, storage_key, file_size, \
     model_family, trigger_words, created_at, updated_at";

/// Provides CRUD operations for LoRA weight files.
pub struct LoraRepo;

impl LoraRepo {
    /// Insert a LoRA, or refresh the row if the user already has one with
    /// the same file name (re-upload overwrites the object).
    pub async fn upsert(pool: &PgPool, user_id: &str, input: &NewLora) -> Result<Lora, sqlx::Error> {
        let query = format!(
            "INSERT INTO loras \
                (user_id, name, file_name, storage_key, file_size, model_family, trigger_words) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ON CONSTRAINT uq_loras_user_file_name DO UPDATE SET \
                storage_key = EXCLUDED.storage_key, \
                file_size = EXCLUDED.file_size, \
                name = EXCLUDED.name, \
                model_family = COALESCE(EXCLUDED.model_family, loras.model_family), \
                trigger_words = COALESCE(EXCLUDED.trigger_words, loras.trigger_words) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lora>(&query)
            .bind(user_id)
            .bind(&input.name)
            .bind(&input.file_name)
            .bind(&input.storage_key)
            .bind(input.file_size)
            .bind(&input.model_family)
            .bind(&input.trigger_words)
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Lora>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM loras WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Lora>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's LoRAs by name.
    pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<Lora>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM loras WHERE user_id = $1 ORDER BY name ASC");
        sqlx::query_as::<_, Lora>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
        input: &UpdateLora,
    ) -> Result<Option<Lora>, sqlx::Error> {
        let query = format!(
            "UPDATE loras SET \
                name = COALESCE($3, name), \
                model_family = COALESCE($4, model_family), \
                trigger_words = COALESCE($5, trigger_words) \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Lora>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&input.name)
            .bind(&input.model_family)
            .bind(&input.trigger_words)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM loras WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the user's rows whose storage key is not in `keep_keys`.
    /// Returns the number of rows removed.
    pub async fn delete_missing(
        pool: &PgPool,
        user_id: &str,
        keep_keys: &[String],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM loras WHERE user_id = $1 AND NOT (storage_key = ANY($2))",
        )
        .bind(user_id)
        .bind(keep_keys)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
