//! Password authentication service.
//!
//! Passwords are stored as argon2id PHC strings. Login attempts are throttled
//! per username with a keyed governor limiter: a burst of five, then one
//! attempt every twelve seconds. Usernames are capped in length before they
//! become limiter keys, and fully replenished keys are pruned every
//! [`PRUNE_EVERY`] attempts so the key map stays bounded.

mod error;

pub use error::AuthError;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::instrument;

use propfee_core::User;

use crate::db::FeeStore;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Login attempts between prunes of the throttle map.
pub const PRUNE_EVERY: u64 = 256;

const LOGIN_BURST: u32 = 5;
const LOGIN_REPLENISH: Duration = Duration::from_secs(12);

/// Login throttling quota.
fn login_quota() -> Quota {
    Quota::with_period(LOGIN_REPLENISH)
        .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(LOGIN_BURST).unwrap_or(NonZeroU32::MIN))
}

/// Authentication service. Cheap to clone.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn FeeStore>,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    attempts: Arc<AtomicU64>,
}

impl AuthService {
    /// Create a service with the default login throttle.
    #[must_use]
    pub fn new(store: Arc<dyn FeeStore>) -> Self {
        Self::with_quota(store, login_quota())
    }

    /// Create a service with a custom login throttle.
    #[must_use]
    pub fn with_quota(store: Arc<dyn FeeStore>, quota: Quota) -> Self {
        Self {
            store,
            limiter: Arc::new(RateLimiter::keyed(quota)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop throttle entries that have fully replenished.
    pub fn prune_throttle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of usernames the throttle is tracking.
    #[must_use]
    pub fn throttled_usernames(&self) -> usize {
        self.limiter.len()
    }

    fn throttle(&self, username: &str) -> Result<(), AuthError> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt % PRUNE_EVERY == 0 {
            self.prune_throttle();
            tracing::debug!(tracked = self.limiter.len(), "Pruned login throttle");
        }

        if self.limiter.check_key(&username.to_owned()).is_err() {
            tracing::warn!(username, "Login throttled");
            return Err(AuthError::TooManyAttempts);
        }
        Ok(())
    }

    /// Verify a username and password.
    ///
    /// The attempt counts against the throttle before anything is looked up,
    /// so unknown usernames are throttled too. Usernames longer than
    /// [`MAX_USERNAME_LENGTH`] are rejected without touching the throttle.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TooManyAttempts` when throttled,
    /// `AuthError::InvalidCredentials` for an unknown user or wrong password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.chars().count() > MAX_USERNAME_LENGTH {
            tracing::info!("Login failed: username too long");
            return Err(AuthError::InvalidCredentials);
        }
        self.throttle(username)?;

        let Some(credentials) = self.store.find_credentials(username).await? else {
            tracing::info!(username, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &credentials.password_hash)? {
            tracing::info!(username, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %credentials.user.id, "User logged in");
        Ok(credentials.user)
    }
}

/// Check a password against the minimum length.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if it is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password with argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` for short passwords and
/// `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored PHC string.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if the stored hash is malformed.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use propfee_core::{UserId, UserRole};

    use super::*;
    use crate::db::MemoryStore;

    fn service() -> AuthService {
        let hash = hash_password("correct horse").expect("hash");
        let store = MemoryStore::new().with_user(
            User {
                id: UserId::new("user-1"),
                username: "admin".to_owned(),
                display_name: "管理员".to_owned(),
                role: UserRole::Admin,
            },
            hash,
        );
        AuthService::new(Arc::new(store))
    }

    #[test]
    fn hash_round_trips_and_rejects_wrong_password() {
        let hash = hash_password("s3cret-password").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-password", &hash).expect("verify"));
        assert!(!verify_password("other-password", &hash).expect("verify"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            hash_password("short"),
            Err(AuthError::WeakPassword { min: 8 })
        ));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "plaintext"),
            Err(AuthError::PasswordHash(_))
        ));
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_password() {
        let user = service().login(" admin ", "correct horse").await.expect("login");
        assert_eq!(user.username, "admin");
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let auth = service();
        let unknown = auth.login("nobody", "correct horse").await.unwrap_err();
        let wrong = auth.login("admin", "wrong horse").await.unwrap_err();
        assert_eq!(unknown.user_message(), wrong.user_message());
        assert_eq!(wrong.user_message(), "用户名或密码错误");
    }

    #[tokio::test]
    async fn repeated_attempts_are_throttled() {
        let auth = service();
        for _ in 0..LOGIN_BURST {
            let err = auth.login("admin", "wrong horse").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        let err = auth.login("admin", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::TooManyAttempts));

        // Other usernames have their own budget.
        let err = auth.login("someone", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn replenished_throttle_entries_are_pruned() {
        let quota = Quota::with_period(Duration::from_millis(1))
            .expect("quota")
            .allow_burst(NonZeroU32::MIN);
        let auth = AuthService::with_quota(Arc::new(MemoryStore::new()), quota);

        for username in ["ghost-1", "ghost-2", "ghost-3"] {
            let err = auth.login(username, "password").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert_eq!(auth.throttled_usernames(), 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        auth.prune_throttle();
        assert_eq!(auth.throttled_usernames(), 0);
    }

    #[tokio::test]
    async fn throttle_prunes_itself_periodically() {
        let quota = Quota::with_period(Duration::from_millis(1))
            .expect("quota")
            .allow_burst(NonZeroU32::MIN);
        let auth = AuthService::with_quota(Arc::new(MemoryStore::new()), quota);

        for i in 0..PRUNE_EVERY - 1 {
            let _ = auth.login(&format!("ghost-{i}"), "password").await;
        }
        assert_eq!(auth.throttled_usernames() as u64, PRUNE_EVERY - 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = auth.login("last", "password").await;
        assert_eq!(auth.throttled_usernames(), 1);
    }

    #[tokio::test]
    async fn overlong_usernames_never_become_throttle_keys() {
        let auth = service();
        let username = "x".repeat(MAX_USERNAME_LENGTH + 1);
        let err = auth.login(&username, "password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(auth.throttled_usernames(), 0);
    }
}
