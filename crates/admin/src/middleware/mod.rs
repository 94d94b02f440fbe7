//! HTTP middleware for the dashboard server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is enforced per handler with the [`auth::RequireAuth`]
//! extractor.

pub mod auth;
pub mod session;

pub use auth::{AuthRejection, RequireAuth};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
