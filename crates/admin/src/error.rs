//! Unified error handling for the HTTP layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{AuthError, DashboardError, SessionError};

/// Application-level error type for the dashboard API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A dashboard action failed.
    #[error("{0}")]
    Dashboard(#[from] DashboardError),

    /// Login failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Dashboard(e) => match e {
                DashboardError::Validation(_) | DashboardError::Amount(_) => {
                    StatusCode::BAD_REQUEST
                }
                DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
                DashboardError::Conflict(_) | DashboardError::Contended => StatusCode::CONFLICT,
                DashboardError::Store(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
                AuthError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
                AuthError::PasswordHash(_) | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client.
    fn client_message(&self) -> String {
        match self {
            Self::Dashboard(e) => e.user_message(),
            Self::Auth(e) => e.user_message(),
            Self::Session(_) => "服务器内部错误".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: &str, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_owned()),
            username: Some(username.to_owned()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
