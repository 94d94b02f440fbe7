//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;

/// Missing `DATABASE_URL` / `PROPFEE_DATABASE_URL`.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: PROPFEE_DATABASE_URL or DATABASE_URL")]
pub struct MissingDatabaseUrl;

/// Read the database URL the same way the server does.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("PROPFEE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// Connect using the server's pool settings.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(propfee_admin::db::create_pool(&url).await?)
}
