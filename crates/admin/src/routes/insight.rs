//! Insight handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::middleware::RequireAuth;
use crate::services::{InsightOutcome, InsightView};
use crate::state::AppState;

/// Build the insight router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/insight", get(current))
        .route("/api/insight/refresh", post(refresh))
}

/// Result of a refresh request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// `updated`, `busy` or `skipped`.
    pub status: &'static str,
    pub text: String,
    pub busy: bool,
}

/// GET /api/insight
async fn current(_: RequireAuth, State(state): State<AppState>) -> Json<InsightView> {
    Json(state.dashboard().insight().await)
}

/// Run a refresh and wait for it. A refresh already in flight is not
/// restarted.
///
/// POST /api/insight/refresh
async fn refresh(_: RequireAuth, State(state): State<AppState>) -> Json<RefreshResponse> {
    let outcome = state.dashboard().refresh_insight().await;
    let status = match outcome {
        InsightOutcome::Updated(_) => "updated",
        InsightOutcome::Busy => "busy",
        InsightOutcome::Skipped => "skipped",
    };
    let view = state.dashboard().insight().await;
    Json(RefreshResponse {
        status,
        text: view.text,
        busy: view.busy,
    })
}
