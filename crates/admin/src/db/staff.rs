//! Staff repository.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use propfee_core::{Amount, AmountError, DepartmentId, NewStaff, Staff, StaffId, StaffPatch};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct StaffRow {
    id: String,
    name: String,
    dept_id: Option<String>,
    collected_amount: Decimal,
    target_amount: Decimal,
}

impl TryFrom<StaffRow> for Staff {
    type Error = RepositoryError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        let corrupt = |e: AmountError| {
            RepositoryError::DataCorruption(format!("staff {}: {e}", row.id.as_str()))
        };
        let collected_amount = Amount::new(row.collected_amount).map_err(corrupt)?;
        let target = Amount::new(row.target_amount).map_err(corrupt)?;

        Ok(Self {
            id: StaffId::new(row.id),
            name: row.name,
            dept_id: row.dept_id.map(DepartmentId::new),
            collected_amount,
            target,
        })
    }
}

const STAFF_COLUMNS: &str = "id, name, dept_id, collected_amount, target_amount";

/// Repository for staff rows.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all staff in creation order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored amount is negative.
    pub async fn list_all(&self) -> Result<Vec<Staff>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffRow>(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff ORDER BY created_at, id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Register a staff member with a zero collected total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the department does not exist.
    #[instrument(skip(self, input), fields(name = %input.name, department_id = %input.dept_id))]
    pub async fn create(&self, input: &NewStaff) -> Result<Staff, RepositoryError> {
        self.insert(&StaffId::generate(), input, Amount::ZERO).await
    }

    /// Insert a staff member with a caller-chosen id and opening total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a taken id or unknown department.
    pub async fn insert(
        &self,
        id: &StaffId,
        input: &NewStaff,
        collected: Amount,
    ) -> Result<Staff, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "INSERT INTO staff (id, name, dept_id, collected_amount, target_amount)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.dept_id)
        .bind(Decimal::from(collected))
        .bind(Decimal::from(input.target))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "unknown department or duplicate staff id"))?;

        row.try_into()
    }

    /// Apply a partial update, including a direct collected-total correction.
    /// `$6` flags whether `dept_id` was given, so an explicit `None` unassigns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no staff member has this id.
    #[instrument(skip(self, patch), fields(staff_id = %id))]
    pub async fn update(&self, id: &StaffId, patch: &StaffPatch) -> Result<Staff, RepositoryError> {
        let row = sqlx::query_as::<_, StaffRow>(&format!(
            "UPDATE staff
             SET name = COALESCE($2, name),
                 dept_id = CASE WHEN $6 THEN $3 ELSE dept_id END,
                 target_amount = COALESCE($4, target_amount),
                 collected_amount = COALESCE($5, collected_amount)
             WHERE id = $1
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.dept_id.as_ref().and_then(Option::as_ref))
        .bind(patch.target.map(Decimal::from))
        .bind(patch.collected_amount.map(Decimal::from))
        .bind(patch.dept_id.is_some())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "unknown department"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a staff member. The schema cascades their fee records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no staff member has this id.
    #[instrument(skip(self), fields(staff_id = %id))]
    pub async fn delete(&self, id: &StaffId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM staff WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
