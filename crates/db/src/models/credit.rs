//! Credit activity models and DTOs.

use engui_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `credit_activities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditActivity {
    pub id: DbId,
    pub user_id: String,
    pub activity_type: String,
    pub amount: f64,
    pub job_id: Option<DbId>,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /credits`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCreditActivity {
    pub activity_type: String,
    pub amount: f64,
    pub description: Option<String>,
}

/// Aggregate row produced by `CreditRepo::summary`.
#[derive(Debug, Clone, FromRow)]
pub struct CreditTotals {
    pub balance: f64,
    pub total_spent: f64,
    pub total_added: f64,
    pub activity_count: i64,
}
