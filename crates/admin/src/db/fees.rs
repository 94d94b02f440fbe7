//! Fee entry repository.
//!
//! Posting a fee is the one multi-row write: the record insert and the
//! staff total increment share a transaction, and the increment is done
//! by the database (`collected_amount + $1`) so concurrent posts never
//! overwrite each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use propfee_core::{Amount, FeeEntryRecord, FeeRecordId, StaffId};

use super::{PostedFee, RepositoryError};

#[derive(Debug, sqlx::FromRow)]
struct FeeRow {
    id: String,
    staff_id: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeeRow> for FeeEntryRecord {
    type Error = RepositoryError;

    fn try_from(row: FeeRow) -> Result<Self, Self::Error> {
        let amount = Amount::new(row.amount)
            .and_then(Amount::require_positive)
            .map_err(|e| RepositoryError::DataCorruption(format!("fee {}: {e}", row.id)))?;

        Ok(Self {
            id: FeeRecordId::new(row.id),
            staff_id: StaffId::new(row.staff_id),
            amount,
            timestamp: row.created_at,
        })
    }
}

/// Repository for fee entry rows.
pub struct FeeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FeeRepository<'a> {
    /// Create a new fee repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every fee record, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<FeeEntryRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, FeeRow>(
            "SELECT id, staff_id, amount, created_at FROM fees ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Record a fee and increment the staff member's total atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member does not exist;
    /// nothing is written in that case.
    #[instrument(skip(self), fields(staff_id = %staff_id, amount = %amount))]
    pub async fn post(&self, staff_id: &StaffId, amount: Amount) -> Result<PostedFee, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let collected: Decimal = sqlx::query_scalar(
            "UPDATE staff
             SET collected_amount = collected_amount + $1
             WHERE id = $2
             RETURNING collected_amount",
        )
        .bind(Decimal::from(amount))
        .bind(staff_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let row = sqlx::query_as::<_, FeeRow>(
            "INSERT INTO fees (id, staff_id, amount)
             VALUES ($1, $2, $3)
             RETURNING id, staff_id, amount, created_at",
        )
        .bind(FeeRecordId::generate())
        .bind(staff_id)
        .bind(Decimal::from(amount))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let collected_amount = Amount::new(collected).map_err(|e| {
            RepositoryError::DataCorruption(format!("staff {staff_id} total: {e}"))
        })?;

        Ok(PostedFee {
            record: row.try_into()?,
            collected_amount,
        })
    }
}
