//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password login with argon2 hashing and per-username throttling
//! - `dashboard` - The dashboard state container and its actions
//! - `session` - User session over injectable storage

pub mod auth;
pub mod dashboard;
pub mod session;

pub use auth::{
    AuthError, AuthService, MAX_USERNAME_LENGTH, hash_password, validate_password,
};
pub use dashboard::{
    DashboardError, DashboardState, DashboardView, InsightOutcome, InsightView, LoadState,
    ReconcileReport,
};
pub use session::{
    MemorySessionStorage, SessionError, SessionStorage, TowerSessionStorage, UserSession,
};
