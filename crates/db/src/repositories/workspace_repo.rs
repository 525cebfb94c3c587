//! Repository for the `workspaces` table.
//!
//! Each user has at most one default workspace (partial unique index
//! `uq_workspaces_user_default`). It is created lazily on first access.

use engui_core::types::DbId;
use engui_core::workspace::DEFAULT_WORKSPACE_NAME;
use sqlx::PgPool;

use crate::models::workspace::{CreateWorkspace, UpdateWorkspace, Workspace, WorkspaceSummary};

const COLUMNS: &str = "id, user_id, name, description, is_default, created_at, updated_at";

/// Provides CRUD operations for workspaces.
pub struct WorkspaceRepo;

impl WorkspaceRepo {
    /// Insert a new non-default workspace.
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        input: &CreateWorkspace,
    ) -> Result<Workspace, sqlx::Error> {
        let query = format!(
            "INSERT INTO workspaces (user_id, name, description) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workspace>(&query)
            .bind(user_id)
            .bind(input.name.trim())
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a workspace owned by `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Workspace>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workspaces WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Workspace>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Return the user's default workspace, creating it if absent.
    ///
    /// If a non-default workspace already uses the default name, that
    /// workspace is promoted instead.
    pub async fn get_or_create_default(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Workspace, sqlx::Error> {
        let select = format!(
            "SELECT {COLUMNS} FROM workspaces WHERE user_id = $1 AND is_default"
        );
        if let Some(existing) = sqlx::query_as::<_, Workspace>(&select)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
        {
            return Ok(existing);
        }

        // Concurrent callers race on the unique indexes; the loser inserts
        // nothing and falls through to the promotion/select below.
        let insert = format!(
            "INSERT INTO workspaces (user_id, name, is_default) \
             VALUES ($1, $2, true) \
             ON CONFLICT DO NOTHING \
             RETURNING {COLUMNS}"
        );
        if let Some(created) = sqlx::query_as::<_, Workspace>(&insert)
            .bind(user_id)
            .bind(DEFAULT_WORKSPACE_NAME)
            .fetch_optional(pool)
            .await?
        {
            tracing::info!(user_id, workspace_id = created.id, "Created default workspace");
            return Ok(created);
        }

        let promote = format!(
            "UPDATE workspaces SET is_default = true \
             WHERE user_id = $1 AND name = $2 \
               AND NOT EXISTS (SELECT 1 FROM workspaces WHERE user_id = $1 AND is_default) \
             RETURNING {COLUMNS}"
        );
        if let Some(promoted) = sqlx::query_as::<_, Workspace>(&promote)
            .bind(user_id)
            .bind(DEFAULT_WORKSPACE_NAME)
            .fetch_optional(pool)
            .await?
        {
            return Ok(promoted);
        }

        sqlx::query_as::<_, Workspace>(&select)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// List a user's workspaces with media counts, default first.
    pub async fn list_with_counts(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<WorkspaceSummary>, sqlx::Error> {
        sqlx::query_as::<_, WorkspaceSummary>(
            "SELECT w.id, w.user_id, w.name, w.description, w.is_default, \
                    w.created_at, w.updated_at, COUNT(m.id) AS media_count \
             FROM workspaces w \
             LEFT JOIN workspace_media m ON m.workspace_id = w.id \
             WHERE w.user_id = $1 \
             GROUP BY w.id \
             ORDER BY w.is_default DESC, w.name ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Update a workspace. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
        input: &UpdateWorkspace,
    ) -> Result<Option<Workspace>, sqlx::Error> {
        let query = format!(
            "UPDATE workspaces SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description) \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workspace>(&query)
            .bind(id)
            .bind(user_id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Make `id` the user's default workspace, clearing the previous one in
    /// the same transaction.
    pub async fn set_default(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<Workspace>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM workspaces WHERE id = $1 AND user_id = $2 FOR UPDATE")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query("UPDATE workspaces SET is_default = false WHERE user_id = $1 AND is_default AND id <> $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "UPDATE workspaces SET is_default = true WHERE id = $1 RETURNING {COLUMNS}"
        );
        let workspace = sqlx::query_as::<_, Workspace>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(workspace))
    }

    /// Delete a non-default workspace. Media cascade; jobs keep a NULL
    /// workspace. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM workspaces WHERE id = $1 AND user_id = $2 AND NOT is_default",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
