//! Department handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};

use propfee_core::{Department, DepartmentId, DepartmentPatch, NewDepartment};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the departments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/departments", get(list).post(create))
        .route("/api/departments/{id}", patch(update).delete(remove))
}

/// GET /api/departments
async fn list(_: RequireAuth, State(state): State<AppState>) -> Json<Vec<Department>> {
    Json(state.dashboard().departments().await)
}

/// POST /api/departments
async fn create(
    _: RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<NewDepartment>,
) -> Result<(StatusCode, Json<Department>), AppError> {
    let department = state.dashboard().register_department(input).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

/// PATCH /api/departments/{id}
async fn update(
    _: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DepartmentId>,
    Json(patch): Json<DepartmentPatch>,
) -> Result<Json<Department>, AppError> {
    Ok(Json(state.dashboard().update_department(&id, patch).await?))
}

/// DELETE /api/departments/{id}
async fn remove(
    _: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DepartmentId>,
) -> Result<StatusCode, AppError> {
    state.dashboard().delete_department(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
