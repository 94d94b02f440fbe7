//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness
//! GET    /health/ready            - Store readiness
//!
//! # Auth
//! POST   /api/auth/login          - Log in, starts a session
//! POST   /api/auth/logout         - Log out
//! GET    /api/auth/me             - Current user
//!
//! # Dashboard
//! GET    /api/dashboard           - Load state, stats, record feed, insight
//! POST   /api/dashboard/refresh   - Reconcile with the store
//! GET    /api/charts              - Department share and staff ranking
//! GET    /api/hierarchy           - Department to staff progress tree
//!
//! # Departments
//! GET    /api/departments         - List
//! POST   /api/departments         - Register
//! PATCH  /api/departments/{id}    - Edit
//! DELETE /api/departments/{id}    - Delete (staff become unassigned)
//!
//! # Staff
//! GET    /api/staff               - List
//! POST   /api/staff               - Register
//! PATCH  /api/staff/{id}          - Edit (including total correction)
//! DELETE /api/staff/{id}          - Delete (with their records)
//!
//! # Fees
//! POST   /api/fees                - Post a fee entry
//!
//! # Insight
//! GET    /api/insight             - Current text and busy flag
//! POST   /api/insight/refresh     - Trigger a refresh
//! ```
//!
//! Every `/api/*` route except login requires a logged-in user.

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod departments;
pub mod fees;
pub mod insight;
pub mod staff;

/// Build every route, without state or outer layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(departments::router())
        .merge(staff::router())
        .merge(fees::router())
        .merge(insight::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
