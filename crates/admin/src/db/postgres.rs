//! `PostgreSQL` implementation of [`FeeStore`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use propfee_core::{
    Amount, DashboardData, Department, DepartmentId, DepartmentPatch, NewDepartment, NewStaff,
    Staff, StaffId, StaffPatch,
};

use super::{
    DepartmentRepository, FeeRepository, FeeStore, PostedFee, RepositoryError, StaffRepository,
    UserCredentials, UserRepository,
};

/// Fee store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgFeeStore {
    pool: PgPool,
}

impl PgFeeStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FeeStore for PgFeeStore {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<DashboardData, RepositoryError> {
        let department_repo = DepartmentRepository::new(&self.pool);
        let staff_repo = StaffRepository::new(&self.pool);
        let fee_repo = FeeRepository::new(&self.pool);
        let (departments, staff, records) = tokio::try_join!(
            department_repo.list_all(),
            staff_repo.list_all(),
            fee_repo.list_all(),
        )?;

        tracing::debug!(
            departments = departments.len(),
            staff = staff.len(),
            records = records.len(),
            "Fetched dashboard data"
        );

        Ok(DashboardData {
            departments,
            staff,
            records,
        })
    }

    async fn post_fee_entry(
        &self,
        staff_id: &StaffId,
        amount: Amount,
    ) -> Result<PostedFee, RepositoryError> {
        FeeRepository::new(&self.pool).post(staff_id, amount).await
    }

    async fn register_department(
        &self,
        input: &NewDepartment,
    ) -> Result<Department, RepositoryError> {
        DepartmentRepository::new(&self.pool).create(input).await
    }

    async fn update_department(
        &self,
        id: &DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Department, RepositoryError> {
        DepartmentRepository::new(&self.pool).update(id, patch).await
    }

    async fn delete_department(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        DepartmentRepository::new(&self.pool).delete(id).await
    }

    async fn register_staff(&self, input: &NewStaff) -> Result<Staff, RepositoryError> {
        StaffRepository::new(&self.pool).create(input).await
    }

    async fn update_staff(
        &self,
        id: &StaffId,
        patch: &StaffPatch,
    ) -> Result<Staff, RepositoryError> {
        StaffRepository::new(&self.pool).update(id, patch).await
    }

    async fn delete_staff(&self, id: &StaffId) -> Result<(), RepositoryError> {
        StaffRepository::new(&self.pool).delete(id).await
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        UserRepository::new(&self.pool)
            .find_credentials(username)
            .await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
