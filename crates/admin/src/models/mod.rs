//! Types stored in the session and returned by the auth routes.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
