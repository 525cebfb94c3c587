//! Repository for the `credit_activities` table.

use engui_core::credits::ACTIVITY_JOB_CHARGE;
use engui_core::types::DbId;
use sqlx::PgPool;

use crate::models::credit::{CreditActivity, CreditTotals};
use crate::{clamp_limit, clamp_offset};

const COLUMNS: &str = "id, user_id, activity_type, amount, job_id, description, \
     created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Provides append and aggregate queries over credit activities.
pub struct CreditRepo;

impl CreditRepo {
    /// Append an activity.
    pub async fn record(
        pool: &PgPool,
        user_id: &str,
        activity_type: &str,
        amount: f64,
        job_id: Option<DbId>,
        description: Option<&str>,
    ) -> Result<CreditActivity, sqlx::Error> {
        let query = format!(
            "INSERT INTO credit_activities (user_id, activity_type, amount, job_id, description) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreditActivity>(&query)
            .bind(user_id)
            .bind(activity_type)
            .bind(amount)
            .bind(job_id)
            .bind(description)
            .fetch_one(pool)
            .await
    }

    /// Charge a completed job. `cost` is positive; the stored amount is
    /// negative. A job is charged at most once; returns `None` if it was
    /// already charged.
    pub async fn record_job_charge(
        pool: &PgPool,
        user_id: &str,
        job_id: DbId,
        cost: f64,
        description: &str,
    ) -> Result<Option<CreditActivity>, sqlx::Error> {
        let query = format!(
            "INSERT INTO credit_activities (user_id, activity_type, amount, job_id, description) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (job_id) WHERE activity_type = 'job_charge' DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CreditActivity>(&query)
            .bind(user_id)
            .bind(ACTIVITY_JOB_CHARGE)
            .bind(-cost.abs())
            .bind(job_id)
            .bind(description)
            .fetch_optional(pool)
            .await
    }

    /// List a user's activities, newest first.
    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<CreditActivity>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM credit_activities WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CreditActivity>(&query)
            .bind(user_id)
            .bind(clamp_limit(limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await
    }

    /// Aggregate balance and totals for a user.
    pub async fn totals(pool: &PgPool, user_id: &str) -> Result<CreditTotals, sqlx::Error> {
        sqlx::query_as::<_, CreditTotals>(
            "SELECT \
                COALESCE(SUM(amount), 0)::float8 AS balance, \
                COALESCE(-SUM(amount) FILTER (WHERE amount < 0), 0)::float8 AS total_spent, \
                COALESCE(SUM(amount) FILTER (WHERE amount > 0), 0)::float8 AS total_added, \
                COUNT(*) AS activity_count \
             FROM credit_activities WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
