//! Department repository.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use propfee_core::{Amount, Department, DepartmentId, DepartmentPatch, NewDepartment};

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DepartmentRow {
    id: String,
    name: String,
    color: String,
    target_amount: Option<Decimal>,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = RepositoryError;

    fn try_from(row: DepartmentRow) -> Result<Self, Self::Error> {
        let target_amount = row
            .target_amount
            .map(Amount::new)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("department {}: {e}", row.id))
            })?;

        Ok(Self {
            id: DepartmentId::new(row.id),
            name: row.name,
            color: row.color,
            target_amount,
        })
    }
}

const DEPARTMENT_COLUMNS: &str = "id, name, color, target_amount";

// =============================================================================
// Repository
// =============================================================================

/// Repository for department rows.
pub struct DepartmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DepartmentRepository<'a> {
    /// Create a new department repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all departments in creation order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored amount is negative.
    pub async fn list_all(&self) -> Result<Vec<Department>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepartmentRow>(&format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY created_at, id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Insert a department with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &NewDepartment) -> Result<Department, RepositoryError> {
        self.insert(&DepartmentId::generate(), input).await
    }

    /// Insert a department with a caller-chosen id (used for seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id is taken.
    pub async fn insert(
        &self,
        id: &DepartmentId,
        input: &NewDepartment,
    ) -> Result<Department, RepositoryError> {
        let row = sqlx::query_as::<_, DepartmentRow>(&format!(
            "INSERT INTO departments (id, name, color, target_amount)
             VALUES ($1, $2, $3, $4)
             RETURNING {DEPARTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.color)
        .bind(input.target_amount.map(Decimal::from))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "department already exists"))?;

        row.try_into()
    }

    /// Apply a partial update. `$4` flags whether `target_amount` was given,
    /// so an explicit `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no department has this id.
    #[instrument(skip(self, patch), fields(department_id = %id))]
    pub async fn update(
        &self,
        id: &DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Department, RepositoryError> {
        let row = sqlx::query_as::<_, DepartmentRow>(&format!(
            "UPDATE departments
             SET name = COALESCE($2, name),
                 color = COALESCE($3, color),
                 target_amount = CASE WHEN $4 THEN $5 ELSE target_amount END
             WHERE id = $1
             RETURNING {DEPARTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.color.as_deref())
        .bind(patch.target_amount.is_some())
        .bind(patch.target_amount.flatten().map(Decimal::from))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a department. The schema nulls `staff.dept_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no department has this id.
    #[instrument(skip(self), fields(department_id = %id))]
    pub async fn delete(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of departments (used by seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
