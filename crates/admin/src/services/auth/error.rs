//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur while logging in or managing passwords.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Too many login attempts for this username.
    #[error("too many login attempts, try again later")]
    TooManyAttempts,

    /// The stored hash could not be parsed or a new hash could not be made.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Password does not meet the minimum length.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Text shown on the login form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "用户名或密码错误".to_owned(),
            Self::TooManyAttempts => "登录尝试次数过多，请稍后再试".to_owned(),
            Self::WeakPassword { min } => format!("密码长度至少为 {min} 位"),
            Self::PasswordHash(_) | Self::Repository(_) => {
                "登录过程中发生错误，请稍后重试".to_owned()
            }
        }
    }
}
