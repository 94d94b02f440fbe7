//! Authentication extractor.
//!
//! Presence of a current user in the session is the only access gate.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::CurrentUser;
use crate::services::{TowerSessionStorage, UserSession};

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("你好，{}", user.display_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection returned when no user is logged in.
#[derive(Debug)]
pub enum AuthRejection {
    /// No session layer, or no user in the session.
    Unauthorized,
    /// The session store failed.
    SessionUnavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "请先登录"),
            Self::SessionUnavailable => (StatusCode::INTERNAL_SERVER_ERROR, "会话服务不可用"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        let user = UserSession::new(TowerSessionStorage::new(session))
            .current()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to read session");
                AuthRejection::SessionUnavailable
            })?
            .ok_or(AuthRejection::Unauthorized)?;

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_status_codes() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::SessionUnavailable.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
