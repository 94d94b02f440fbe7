//! Authentication route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::{TowerSessionStorage, UserSession};
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Verify credentials and start a session.
///
/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> Result<Json<CurrentUser>, AppError> {
    let user = CurrentUser::from(state.auth().login(&form.username, &form.password).await?);

    UserSession::new(TowerSessionStorage::new(session))
        .login(&user)
        .await?;
    set_sentry_user(user.id.as_str(), &user.username);

    Ok(Json(user))
}

/// Clear the session.
///
/// POST /api/auth/logout
async fn logout(session: Session) -> Result<StatusCode, AppError> {
    UserSession::new(TowerSessionStorage::new(session))
        .logout()
        .await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user.
///
/// GET /api/auth/me
async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}
