//! Dashboard overview handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use propfee_core::{ChartSeries, DepartmentNode};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::services::{DashboardView, ReconcileReport};
use crate::state::AppState;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(overview))
        .route("/api/dashboard/refresh", post(refresh))
        .route("/api/charts", get(charts))
        .route("/api/hierarchy", get(hierarchy))
}

/// GET /api/dashboard
async fn overview(_: RequireAuth, State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.dashboard().view().await)
}

/// Re-fetch from the store and replace local state.
///
/// POST /api/dashboard/refresh
async fn refresh(
    _: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, AppError> {
    Ok(Json(state.dashboard().reconcile().await?))
}

/// GET /api/charts
async fn charts(_: RequireAuth, State(state): State<AppState>) -> Json<ChartSeries> {
    Json(state.dashboard().charts().await)
}

/// GET /api/hierarchy
async fn hierarchy(_: RequireAuth, State(state): State<AppState>) -> Json<Vec<DepartmentNode>> {
    Json(state.dashboard().hierarchy().await)
}
