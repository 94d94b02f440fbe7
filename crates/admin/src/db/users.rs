//! User repository.
//!
//! The password hash only leaves this module inside [`UserCredentials`],
//! whose `Debug` output redacts it.

use sqlx::PgPool;
use tracing::instrument;

use propfee_core::{User, UserId, UserRole};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    display_name: String,
    role: UserRole,
    password_hash: String,
}

/// A user together with their stored password hash.
#[derive(Clone)]
pub struct UserCredentials {
    pub user: User,
    /// argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

impl From<UserRow> for UserCredentials {
    fn from(row: UserRow) -> Self {
        Self {
            user: User {
                id: UserId::new(row.id),
                username: row.username,
                display_name: row.display_name,
                role: row.role,
            },
            password_hash: row.password_hash,
        }
    }
}

/// Repository for user rows.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, display_name, role, password_hash
             FROM users
             WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a user with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    #[instrument(skip(self, password_hash))]
    pub async fn create(
        &self,
        username: &str,
        display_name: &str,
        role: UserRole,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, display_name, role, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, username, display_name, role, password_hash",
        )
        .bind(UserId::generate())
        .bind(username)
        .bind(display_name)
        .bind(role)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "username already exists"))?;

        Ok(UserCredentials::from(row).user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_hash() {
        let creds = UserCredentials {
            user: User {
                id: UserId::new("user-1"),
                username: "admin".to_owned(),
                display_name: "管理员".to_owned(),
                role: UserRole::Admin,
            },
            password_hash: "$argon2id$v=19$secret".to_owned(),
        };
        let debug_output = format!("{creds:?}");
        assert!(debug_output.contains("admin"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("argon2id"));
    }
}
