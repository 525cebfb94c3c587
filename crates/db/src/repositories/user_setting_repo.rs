//! Repository for the `user_settings` table.
//!
//! Values are stored as given; encryption of secrets happens in the API
//! layer before calling [`UserSettingRepo::apply`].

use sqlx::PgPool;

use crate::models::user_setting::{SettingWrite, UserSetting};

const COLUMNS: &str = "id, user_id, service, config_key, config_value, is_encrypted, \
     created_at, updated_at";

/// Provides CRUD operations for per-user provider settings.
pub struct UserSettingRepo;

impl UserSettingRepo {
    /// All settings of a user, grouped by service.
    pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<UserSetting>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_settings WHERE user_id = $1 \
             ORDER BY service ASC, config_key ASC"
        );
        sqlx::query_as::<_, UserSetting>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Settings of a user for a single service.
    pub async fn list_for_service(
        pool: &PgPool,
        user_id: &str,
        service: &str,
    ) -> Result<Vec<UserSetting>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_settings WHERE user_id = $1 AND service = $2 \
             ORDER BY config_key ASC"
        );
        sqlx::query_as::<_, UserSetting>(&query)
            .bind(user_id)
            .bind(service)
            .fetch_all(pool)
            .await
    }

    /// Apply a batch of upserts and deletions in one transaction. Either
    /// every write lands or none does.
    pub async fn apply(
        pool: &PgPool,
        user_id: &str,
        writes: &[SettingWrite<'_>],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for write in writes {
            match write.value {
                Some(value) => {
                    sqlx::query(
                        "INSERT INTO user_settings \
                             (user_id, service, config_key, config_value, is_encrypted) \
                         VALUES ($1, $2, $3, $4, $5) \
                         ON CONFLICT ON CONSTRAINT uq_user_settings_user_service_key DO UPDATE SET \
                            config_value = EXCLUDED.config_value, \
                            is_encrypted = EXCLUDED.is_encrypted",
                    )
                    .bind(user_id)
                    .bind(write.service)
                    .bind(write.key)
                    .bind(value)
                    .bind(write.is_encrypted)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "DELETE FROM user_settings \
                         WHERE user_id = $1 AND service = $2 AND config_key = $3",
                    )
                    .bind(user_id)
                    .bind(write.service)
                    .bind(write.key)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await
    }

    /// Remove every setting of a service. Returns the number removed.
    pub async fn delete_service(
        pool: &PgPool,
        user_id: &str,
        service: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_settings WHERE user_id = $1 AND service = $2")
            .bind(user_id)
            .bind(service)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
