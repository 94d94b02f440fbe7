//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! PROPFEE_NEW_USER_PASSWORD='...' propfee-cli user create -u admin -d "管理员" -r admin
//! ```
//!
//! # Environment Variables
//!
//! - `PROPFEE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `PROPFEE_NEW_USER_PASSWORD` - Password when `--password` is not given

use thiserror::Error;

use propfee_admin::db::{RepositoryError, UserRepository};
use propfee_admin::services::{AuthError, MAX_USERNAME_LENGTH, hash_password};
use propfee_core::{UserId, UserRole};

/// Environment variable read when `--password` is absent.
const PASSWORD_ENV: &str = "PROPFEE_NEW_USER_PASSWORD";

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid role: {0}. Valid roles: admin, staff")]
    InvalidRole(String),

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Username longer than {MAX_USERNAME_LENGTH} characters")]
    UsernameTooLong,

    #[error("No password given: pass --password or set {PASSWORD_ENV}")]
    MissingPassword,

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    Password(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(RepositoryError),

    #[error("Database connection error: {0}")]
    Connection(String),
}

/// Create a new user with an argon2-hashed password.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create_user(
    username: &str,
    display_name: &str,
    role: &str,
    password: Option<String>,
) -> Result<UserId, UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let username = username.trim();
    if username.is_empty() {
        return Err(UserError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(UserError::UsernameTooLong);
    }
    let display_name = match display_name.trim() {
        "" => username,
        name => name,
    };

    dotenvy::dotenv().ok();
    let password = password
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .ok_or(UserError::MissingPassword)?;
    let password_hash = hash_password(&password)?;

    let pool = super::connect()
        .await
        .map_err(|e| UserError::Connection(e.to_string()))?;

    tracing::info!("Creating user: {} ({})", username, role);
    let user = UserRepository::new(&pool)
        .create(username, display_name, role, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(username.to_owned()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Role: {}",
        user.id,
        user.username,
        user.role
    );
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_overlong_username_before_connecting() {
        let username = "x".repeat(MAX_USERNAME_LENGTH + 1);
        let err = create_user(&username, "", "staff", Some("long-enough-password".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UsernameTooLong));
    }

    #[tokio::test]
    async fn test_rejects_unknown_role() {
        let err = create_user("clerk", "", "owner", None).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidRole(role) if role == "owner"));
    }
}
