//! Repository for the `video_projects` table.
//!
//! The project document is stored as JSONB; title, aspect ratio and
//! duration are denormalized for listing.

use engui_core::types::DbId;
use engui_core::video_project::VideoProjectDoc;
use sqlx::PgPool;

use crate::models::video_project::{VideoProject, VideoProjectListQuery, VideoProjectSummary};
use crate::{clamp_limit, clamp_offset};

const COLUMNS: &str = "id, user_id, title, description, aspect_ratio, duration_secs, \
     document, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Provides CRUD operations for sequencer projects.
pub struct VideoProjectRepo;

impl VideoProjectRepo {
    /// Insert a validated project document.
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        doc: &VideoProjectDoc,
    ) -> Result<VideoProject, sqlx::Error> {
        let query = format!(
            "INSERT INTO video_projects \
                (user_id, title, description, aspect_ratio, duration_secs, document) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(user_id)
            .bind(&doc.title)
            .bind(&doc.description)
            .bind(&doc.aspect_ratio)
            .bind(doc.duration_secs)
            .bind(sqlx::types::Json(doc))
            .fetch_one(pool)
            .await
    }

    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
    ) -> Result<Option<VideoProject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM video_projects WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's projects, most recently edited first.
    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        params: &VideoProjectListQuery,
    ) -> Result<Vec<VideoProjectSummary>, sqlx::Error> {
        sqlx::query_as::<_, VideoProjectSummary>(
            "SELECT id, title, description, aspect_ratio, duration_secs, \
                    COALESCE(jsonb_array_length(document -> 'tracks'), 0)::INT AS track_count, \
                    created_at, updated_at \
             FROM video_projects WHERE user_id = $1 \
             ORDER BY updated_at DESC, id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT))
        .bind(clamp_offset(params.offset))
        .fetch_all(pool)
        .await
    }

    /// Replace a project's document.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        user_id: &str,
        doc: &VideoProjectDoc,
    ) -> Result<Option<VideoProject>, sqlx::Error> {
        let query = format!(
            "UPDATE video_projects SET \
                title = $3, description = $4, aspect_ratio = $5, \
                duration_secs = $6, document = $7 \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoProject>(&query)
            .bind(id)
            .bind(user_id)
            .bind(&doc.title)
            .bind(&doc.description)
            .bind(&doc.aspect_ratio)
            .bind(doc.duration_secs)
            .bind(sqlx::types::Json(doc))
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM video_projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
