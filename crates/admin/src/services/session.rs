//! User session with injectable storage.
//!
//! [`UserSession`] is the only place that decides whether someone is logged
//! in. Where the identity lives is up to the [`SessionStorage`]: a
//! tower-sessions cookie session in the server, a plain in-memory slot in
//! tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Session storage failure.
#[derive(Debug, Error)]
#[error("session storage error: {0}")]
pub struct SessionError(pub(crate) String);

impl From<tower_sessions::session::Error> for SessionError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self(e.to_string())
    }
}

/// Where the current user is kept.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// The stored user, if any.
    async fn get(&self) -> Result<Option<CurrentUser>, SessionError>;

    async fn set(&self, user: &CurrentUser) -> Result<(), SessionError>;

    async fn clear(&self) -> Result<(), SessionError>;
}

/// Storage backed by a tower-sessions [`Session`].
#[derive(Clone)]
pub struct TowerSessionStorage {
    session: Session,
}

impl TowerSessionStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl SessionStorage for TowerSessionStorage {
    async fn get(&self) -> Result<Option<CurrentUser>, SessionError> {
        match self
            .session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
        {
            Ok(user) => Ok(user),
            // Unreadable session data is the same as being logged out.
            Err(tower_sessions::session::Error::SerdeJson(e)) => {
                tracing::warn!(error = %e, "Discarding unreadable session user");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, user: &CurrentUser) -> Result<(), SessionError> {
        // New id on privilege change.
        self.session.cycle_id().await?;
        self.session
            .insert(session_keys::CURRENT_USER, user)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.session.flush().await?;
        Ok(())
    }
}

/// Storage held in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    user: RwLock<Option<CurrentUser>>,
}

impl MemorySessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn get(&self) -> Result<Option<CurrentUser>, SessionError> {
        Ok(self.user.read().await.clone())
    }

    async fn set(&self, user: &CurrentUser) -> Result<(), SessionError> {
        *self.user.write().await = Some(user.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        *self.user.write().await = None;
        Ok(())
    }
}

/// The logged-in user, as seen through some storage.
pub struct UserSession<S> {
    storage: S,
}

impl<S: SessionStorage> UserSession<S> {
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The current user, if logged in.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the storage cannot be read.
    pub async fn current(&self) -> Result<Option<CurrentUser>, SessionError> {
        self.storage.get().await
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the storage cannot be read.
    pub async fn is_authenticated(&self) -> Result<bool, SessionError> {
        Ok(self.current().await?.is_some())
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the storage cannot be written.
    pub async fn login(&self, user: &CurrentUser) -> Result<(), SessionError> {
        self.storage.set(user).await?;
        tracing::debug!(user_id = %user.id, "Session started");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the storage cannot be cleared.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.storage.clear().await
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }
}
