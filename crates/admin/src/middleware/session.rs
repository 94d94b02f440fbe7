//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions
//! (SameSite=Strict, 24 hour inactivity expiry).

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::DashboardConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "propfee_session";

/// Schema and table created by the sessions migration.
const SESSION_SCHEMA: &str = "public";
const SESSION_TABLE: &str = "sessions";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// # Errors
///
/// Returns an error if the schema or table name is rejected by the store.
pub fn create_session_layer(
    pool: &PgPool,
    config: &DashboardConfig,
) -> Result<SessionManagerLayer<PostgresStore>, String> {
    // The table is created by migration, not by `PostgresStore::migrate`.
    let store = PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)?
        .with_table_name(SESSION_TABLE)?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/"))
}
