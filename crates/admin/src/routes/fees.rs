//! Fee entry handler.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use propfee_core::{Amount, FeeEntryRecord, StaffId};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the fees router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/fees", post(post_fee))
}

/// A fee entry as submitted by a collector.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFeeRequest {
    pub staff_id: StaffId,
    pub amount: Amount,
}

/// The stored record and the staff member's new total.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFeeResponse {
    pub record: FeeEntryRecord,
    pub collected_amount: Amount,
}

/// POST /api/fees
async fn post_fee(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(form): Json<PostFeeRequest>,
) -> Result<(StatusCode, Json<PostFeeResponse>), AppError> {
    let posted = state.dashboard().post_fee(&form.staff_id, form.amount).await?;
    tracing::debug!(user_id = %user.id, record_id = %posted.record.id, "Fee entry posted by user");
    Ok((
        StatusCode::CREATED,
        Json(PostFeeResponse {
            record: posted.record,
            collected_amount: posted.collected_amount,
        }),
    ))
}
