//! Handlers for the `/credits` ledger.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use engui_core::credits::{validate_manual_activity, CreditSummary};
use engui_db::models::credit::CreateCreditActivity;
use engui_db::repositories::CreditRepo;

use crate::error::AppResult;
use crate::middleware::user::CurrentUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/credits?limit=&offset=
pub async fn list_activities(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let activities =
        CreditRepo::list(&state.pool, &user.user_id, params.limit, params.offset).await?;
    Ok(Json(DataResponse { data: activities }))
}

/// GET /api/v1/credits/summary
pub async fn get_summary(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let totals = CreditRepo::totals(&state.pool, &user.user_id).await?;
    Ok(Json(DataResponse {
        data: CreditSummary {
            balance: totals.balance,
            total_spent: totals.total_spent,
            total_added: totals.total_added,
            activity_count: totals.activity_count,
        },
    }))
}

/// POST /api/v1/credits
///
/// Record a top-up or manual adjustment. Job charges are written by the
/// job lifecycle only.
pub async fn record_activity(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCreditActivity>,
) -> AppResult<impl IntoResponse> {
    validate_manual_activity(&input.activity_type, input.amount)?;

    let activity = CreditRepo::record(
        &state.pool,
        &user.user_id,
        &input.activity_type,
        input.amount,
        None,
        input.description.as_deref().map(str::trim).filter(|d| !d.is_empty()),
    )
    .await?;

    tracing::info!(
        activity_id = activity.id,
        activity_type = %activity.activity_type,
        amount = activity.amount,
        user_id = %user.user_id,
        "Credit activity recorded",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: activity })))
}
