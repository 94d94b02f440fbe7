//! Staff handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};

use propfee_core::{NewStaff, Staff, StaffId, StaffPatch};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the staff router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/staff", get(list).post(create))
        .route("/api/staff/{id}", patch(update).delete(remove))
}

/// GET /api/staff
async fn list(_: RequireAuth, State(state): State<AppState>) -> Json<Vec<Staff>> {
    Json(state.dashboard().staff().await)
}

/// POST /api/staff
async fn create(
    _: RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<NewStaff>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    let staff = state.dashboard().register_staff(input).await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

/// PATCH /api/staff/{id}
async fn update(
    _: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StaffId>,
    Json(patch): Json<StaffPatch>,
) -> Result<Json<Staff>, AppError> {
    Ok(Json(state.dashboard().update_staff(&id, patch).await?))
}

/// Delete a staff member together with their fee records.
///
/// DELETE /api/staff/{id}
async fn remove(
    _: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StaffId>,
) -> Result<StatusCode, AppError> {
    state.dashboard().delete_staff(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
