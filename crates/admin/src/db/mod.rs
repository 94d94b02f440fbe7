//! Data access for the fee collection store.
//!
//! # Tables
//!
//! - `departments` - Organizational groupings with a chart color
//! - `staff` - Fee collectors with running collected totals
//! - `fees` - Append-only fee entries (cascade-deleted with their staff)
//! - `users` - Dashboard logins (argon2 password hashes)
//! - `sessions` - tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p propfee-cli -- migrate
//! ```

pub mod departments;
pub mod fees;
pub mod memory;
pub mod postgres;
pub mod staff;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use propfee_core::{
    Amount, DashboardData, Department, DepartmentId, DepartmentPatch, FeeEntryRecord,
    NewDepartment, NewStaff, Staff, StaffId, StaffPatch,
};

pub use departments::DepartmentRepository;
pub use fees::FeeRepository;
pub use memory::MemoryStore;
pub use postgres::PgFeeStore;
pub use staff::StaffRepository;
pub use users::{UserCredentials, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username, unknown department).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map constraint violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_write(e: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(e)
    }
}

/// Result of posting a fee entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedFee {
    /// The inserted record, with its server-assigned timestamp.
    pub record: FeeEntryRecord,
    /// The staff member's collected total after the increment.
    pub collected_amount: Amount,
}

/// Everything the dashboard needs from its record store.
///
/// Implementations must make `post_fee_entry` atomic: the record insert and
/// the collected-total increment either both happen or neither does.
#[async_trait]
pub trait FeeStore: Send + Sync {
    /// Load all departments, staff and records (records newest first).
    async fn fetch_all(&self) -> Result<DashboardData, RepositoryError>;

    /// Insert a fee record and add its amount to the staff member's total.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown staff id.
    async fn post_fee_entry(
        &self,
        staff_id: &StaffId,
        amount: Amount,
    ) -> Result<PostedFee, RepositoryError>;

    async fn register_department(
        &self,
        input: &NewDepartment,
    ) -> Result<Department, RepositoryError>;

    async fn update_department(
        &self,
        id: &DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Department, RepositoryError>;

    /// Delete a department. Its staff keep their records and lose the link.
    async fn delete_department(&self, id: &DepartmentId) -> Result<(), RepositoryError>;

    async fn register_staff(&self, input: &NewStaff) -> Result<Staff, RepositoryError>;

    async fn update_staff(&self, id: &StaffId, patch: &StaffPatch)
    -> Result<Staff, RepositoryError>;

    /// Delete a staff member and every fee record that references them.
    async fn delete_staff(&self, id: &StaffId) -> Result<(), RepositoryError>;

    /// Look up a user and their password hash by username.
    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    /// Check connectivity (readiness probe).
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
