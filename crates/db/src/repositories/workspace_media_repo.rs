//! Repository for the `workspace_media` table.
//!
//! Callers verify workspace ownership before calling in; every query is
//! scoped by `workspace_id`.

use engui_core::types::DbId;
use sqlx::PgPool;

use crate::models::workspace::{CreateWorkspaceMedia, WorkspaceMedia, WorkspaceMediaQuery};
use crate::{clamp_limit, clamp_offset};

const COLUMNS: &str = "id, workspace_id, job_id, media_type, url, thumbnail_url, \
     file_name, mime_type, file_size, width, height, duration_secs, \
     prompt, model_id, is_favorite, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// Provides CRUD operations for media items in workspaces.
pub struct WorkspaceMediaRepo;

impl WorkspaceMediaRepo {
    /// Insert a media item.
    pub async fn create(
        pool: &PgPool,
        workspace_id: DbId,
        input: &CreateWorkspaceMedia,
    ) -> Result<WorkspaceMedia, sqlx::Error> {
        let query = format!(
            "INSERT INTO workspace_media \
                (workspace_id, job_id, media_type, url, thumbnail_url, file_name, \
                 mime_type, file_size, width, height, duration_secs, prompt, model_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        Self::bind_create(sqlx::query_as::<_, WorkspaceMedia>(&query), workspace_id, input)
            .fetch_one(pool)
            .await
    }

    /// Insert the media item for a completed job. A job is added to a
    /// workspace at most once; returns `None` when it already was.
    pub async fn create_for_job(
        pool: &PgPool,
        workspace_id: DbId,
        input: &CreateWorkspaceMedia,
    ) -> Result<Option<WorkspaceMedia>, sqlx::Error> {
        let query = format!(
            "INSERT INTO workspace_media \
                (workspace_id, job_id, media_type, url, thumbnail_url, file_name, \
                 mime_type, file_size, width, height, duration_secs, prompt, model_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (workspace_id, job_id) WHERE job_id IS NOT NULL DO NOTHING \
             RETURNING {COLUMNS}"
        );
        Self::bind_create(sqlx::query_as::<_, WorkspaceMedia>(&query), workspace_id, input)
            .fetch_optional(pool)
            .await
    }

    fn bind_create<'q>(
        q: sqlx::query::QueryAs<'q, sqlx::Postgres, WorkspaceMedia, sqlx::postgres::PgArguments>,
        workspace_id: DbId,
        input: &'q CreateWorkspaceMedia,
    ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, WorkspaceMedia, sqlx::postgres::PgArguments> {
        q.bind(workspace_id)
            .bind(input.job_id)
            .bind(&input.media_type)
            .bind(&input.url)
            .bind(&input.thumbnail_url)
            .bind(&input.file_name)
            .bind(&input.mime_type)
            .bind(input.file_size)
            .bind(input.width)
            .bind(input.height)
            .bind(input.duration_secs)
            .bind(&input.prompt)
            .bind(&input.model_id)
    }

    /// Find a media item within a workspace.
    pub async fn find(
        pool: &PgPool,
        workspace_id: DbId,
        id: DbId,
    ) -> Result<Option<WorkspaceMedia>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workspace_media WHERE id = $1 AND workspace_id = $2"
        );
        sqlx::query_as::<_, WorkspaceMedia>(&query)
            .bind(id)
            .bind(workspace_id)
            .fetch_optional(pool)
            .await
    }

    /// List media in a workspace, newest first.
    pub async fn list(
        pool: &PgPool,
        workspace_id: DbId,
        params: &WorkspaceMediaQuery,
    ) -> Result<Vec<WorkspaceMedia>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workspace_media \
             WHERE workspace_id = $1 \
               AND ($2::TEXT IS NULL OR media_type = $2) \
               AND (NOT $3 OR is_favorite) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, WorkspaceMedia>(&query)
            .bind(workspace_id)
            .bind(&params.media_type)
            .bind(params.favorites_only)
            .bind(clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(params.offset))
            .fetch_all(pool)
            .await
    }

    /// Update the favorite flag and/or move the item to `target_workspace_id`.
    pub async fn update(
        pool: &PgPool,
        workspace_id: DbId,
        id: DbId,
        is_favorite: Option<bool>,
        target_workspace_id: Option<DbId>,
    ) -> Result<Option<WorkspaceMedia>, sqlx::Error> {
        let query = format!(
            "UPDATE workspace_media SET \
                is_favorite = COALESCE($3, is_favorite), \
                workspace_id = COALESCE($4, workspace_id) \
             WHERE id = $1 AND workspace_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkspaceMedia>(&query)
            .bind(id)
            .bind(workspace_id)
            .bind(is_favorite)
            .bind(target_workspace_id)
            .fetch_optional(pool)
            .await
    }

    /// Remove a media item. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, workspace_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspace_media WHERE id = $1 AND workspace_id = $2")
            .bind(id)
            .bind(workspace_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Media in any of the user's workspaces whose URL or thumbnail starts
    /// with `url_prefix`.
    pub async fn list_with_url_prefix(
        pool: &PgPool,
        user_id: &str,
        url_prefix: &str,
    ) -> Result<Vec<WorkspaceMedia>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM workspace_media m \
             JOIN workspaces w ON w.id = m.workspace_id \
             WHERE w.user_id = $1 \
               AND (starts_with(m.url, $2) OR starts_with(m.thumbnail_url, $2)) \
             ORDER BY m.id ASC",
            prefixed_columns("m")
        );
        sqlx::query_as::<_, WorkspaceMedia>(&query)
            .bind(user_id)
            .bind(url_prefix)
            .fetch_all(pool)
            .await
    }

    /// Replace the stored URL and thumbnail URL.
    pub async fn update_urls(
        pool: &PgPool,
        id: DbId,
        url: &str,
        thumbnail_url: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE workspace_media SET url = $2, thumbnail_url = $3 WHERE id = $1")
                .bind(id)
                .bind(url)
                .bind(thumbnail_url)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// `COLUMNS` qualified with a table alias, for joins.
fn prefixed_columns(alias: &str) -> String {
    COLUMNS
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_columns_qualifies_every_column() {
        let cols = prefixed_columns("m");
        assert!(cols.starts_with("m.id, m.workspace_id"));
        assert!(cols.ends_with("m.updated_at"));
        assert_eq!(cols.matches("m.").count(), COLUMNS.split(',').count());
    }
}
