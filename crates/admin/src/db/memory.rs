//! In-memory [`FeeStore`] mirroring the `PostgreSQL` schema rules.
//!
//! Used by tests and local demos. Deleting a department orphans its staff,
//! deleting a staff member cascades to their records, and fee posts take a
//! single lock so the increment is atomic.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use propfee_core::{
    Amount, DashboardData, Department, DepartmentId, DepartmentPatch, FeeEntryRecord,
    FeeRecordId, NewDepartment, NewStaff, Staff, StaffId, StaffPatch, User,
};

use super::{FeeStore, PostedFee, RepositoryError, UserCredentials};

#[derive(Default)]
struct Tables {
    data: DashboardData,
    users: Vec<UserCredentials>,
}

/// A fee store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing collections (records are kept in the given order).
    #[must_use]
    pub fn with_data(data: DashboardData) -> Self {
        Self {
            tables: Mutex::new(Tables {
                data,
                users: Vec::new(),
            }),
        }
    }

    /// Add a login with an already-hashed password.
    #[must_use]
    pub fn with_user(self, user: User, password_hash: impl Into<String>) -> Self {
        let mut tables = self.tables.into_inner();
        tables.users.push(UserCredentials {
            user,
            password_hash: password_hash.into(),
        });
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Copy of the stored collections.
    pub async fn snapshot(&self) -> DashboardData {
        self.tables.lock().await.data.clone()
    }
}

fn department_exists(data: &DashboardData, id: &DepartmentId) -> bool {
    data.departments.iter().any(|d| &d.id == id)
}

#[async_trait]
impl FeeStore for MemoryStore {
    async fn fetch_all(&self) -> Result<DashboardData, RepositoryError> {
        Ok(self.snapshot().await)
    }

    async fn post_fee_entry(
        &self,
        staff_id: &StaffId,
        amount: Amount,
    ) -> Result<PostedFee, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let data = &mut tables.data;

        let staff = data
            .staff
            .iter_mut()
            .find(|s| &s.id == staff_id)
            .ok_or(RepositoryError::NotFound)?;
        staff.collected_amount = staff.collected_amount + amount;
        let collected_amount = staff.collected_amount;

        let record = FeeEntryRecord {
            id: FeeRecordId::generate(),
            staff_id: staff_id.clone(),
            amount,
            timestamp: Utc::now(),
        };
        data.records.insert(0, record.clone());

        Ok(PostedFee {
            record,
            collected_amount,
        })
    }

    async fn register_department(
        &self,
        input: &NewDepartment,
    ) -> Result<Department, RepositoryError> {
        let department = Department {
            id: DepartmentId::generate(),
            name: input.name.clone(),
            color: input.color.clone(),
            target_amount: input.target_amount,
        };
        self.tables
            .lock()
            .await
            .data
            .departments
            .push(department.clone());
        Ok(department)
    }

    async fn update_department(
        &self,
        id: &DepartmentId,
        patch: &DepartmentPatch,
    ) -> Result<Department, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let department = tables
            .data
            .departments
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or(RepositoryError::NotFound)?;
        department.apply(patch);
        Ok(department.clone())
    }

    async fn delete_department(&self, id: &DepartmentId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let data = &mut tables.data;
        if !department_exists(data, id) {
            return Err(RepositoryError::NotFound);
        }
        data.departments.retain(|d| &d.id != id);
        for staff in &mut data.staff {
            if staff.dept_id.as_ref() == Some(id) {
                staff.dept_id = None;
            }
        }
        Ok(())
    }

    async fn register_staff(&self, input: &NewStaff) -> Result<Staff, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !department_exists(&tables.data, &input.dept_id) {
            return Err(RepositoryError::Conflict("unknown department".to_owned()));
        }
        let staff = Staff {
            id: StaffId::generate(),
            name: input.name.clone(),
            dept_id: Some(input.dept_id.clone()),
            collected_amount: Amount::ZERO,
            target: input.target,
        };
        tables.data.staff.push(staff.clone());
        Ok(staff)
    }

    async fn update_staff(
        &self,
        id: &StaffId,
        patch: &StaffPatch,
    ) -> Result<Staff, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let data = &mut tables.data;
        if let Some(Some(dept_id)) = &patch.dept_id
            && !department_exists(data, dept_id)
        {
            return Err(RepositoryError::Conflict("unknown department".to_owned()));
        }
        let staff = data
            .staff
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or(RepositoryError::NotFound)?;
        staff.apply(patch);
        Ok(staff.clone())
    }

    async fn delete_staff(&self, id: &StaffId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let data = &mut tables.data;
        let before = data.staff.len();
        data.staff.retain(|s| &s.id != id);
        if data.staff.len() == before {
            return Err(RepositoryError::NotFound);
        }
        data.records.retain(|r| &r.staff_id != id);
        Ok(())
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|c| c.user.username == username)
            .cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_one_collector() -> (MemoryStore, DepartmentId, StaffId) {
        let store = MemoryStore::new();
        let dept = store
            .register_department(&NewDepartment {
                name: "住宅一部".to_owned(),
                color: "#6366f1".to_owned(),
                target_amount: None,
            })
            .await
            .expect("department");
        let staff = store
            .register_staff(&NewStaff {
                name: "张伟".to_owned(),
                dept_id: dept.id.clone(),
                target: Amount::from_yuan(200),
            })
            .await
            .expect("staff");
        (store, dept.id, staff.id)
    }

    #[tokio::test]
    async fn post_increments_total_and_prepends_record() {
        let (store, _, staff_id) = store_with_one_collector().await;

        store
            .post_fee_entry(&staff_id, Amount::from_yuan(30))
            .await
            .expect("first");
        let posted = store
            .post_fee_entry(&staff_id, Amount::from_yuan(20))
            .await
            .expect("second");

        assert_eq!(posted.collected_amount, Amount::from_yuan(50));
        let data = store.snapshot().await;
        assert_eq!(data.records.len(), 2);
        assert_eq!(data.records[0].id, posted.record.id);
    }

    #[tokio::test]
    async fn post_for_unknown_staff_writes_nothing() {
        let (store, _, _) = store_with_one_collector().await;
        let result = store
            .post_fee_entry(&StaffId::new("ghost"), Amount::from_yuan(10))
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert!(store.snapshot().await.records.is_empty());
    }

    #[tokio::test]
    async fn deleting_department_orphans_staff_and_keeps_records() {
        let (store, dept_id, staff_id) = store_with_one_collector().await;
        store
            .post_fee_entry(&staff_id, Amount::from_yuan(10))
            .await
            .expect("post");

        store.delete_department(&dept_id).await.expect("delete");

        let data = store.snapshot().await;
        assert!(data.departments.is_empty());
        assert_eq!(data.staff[0].dept_id, None);
        assert_eq!(data.records.len(), 1);
    }

    #[tokio::test]
    async fn deleting_staff_cascades_records() {
        let (store, _, staff_id) = store_with_one_collector().await;
        store
            .post_fee_entry(&staff_id, Amount::from_yuan(10))
            .await
            .expect("post");

        store.delete_staff(&staff_id).await.expect("delete");

        let data = store.snapshot().await;
        assert!(data.staff.is_empty());
        assert!(data.records.is_empty());
    }

    #[tokio::test]
    async fn staff_needs_an_existing_department() {
        let store = MemoryStore::new();
        let result = store
            .register_staff(&NewStaff {
                name: "李强".to_owned(),
                dept_id: DepartmentId::new("dept-x"),
                target: Amount::ZERO,
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn patch_can_unassign_staff_and_clear_target() {
        let (store, dept_id, staff_id) = store_with_one_collector().await;
        store
            .update_department(
                &dept_id,
                &DepartmentPatch {
                    target_amount: Some(Some(Amount::from_yuan(900))),
                    ..DepartmentPatch::default()
                },
            )
            .await
            .expect("set target");
        let dept = store
            .update_department(
                &dept_id,
                &DepartmentPatch {
                    target_amount: Some(None),
                    ..DepartmentPatch::default()
                },
            )
            .await
            .expect("clear target");
        assert_eq!(dept.target_amount, None);

        let staff = store
            .update_staff(
                &staff_id,
                &StaffPatch {
                    dept_id: Some(None),
                    ..StaffPatch::default()
                },
            )
            .await
            .expect("unassign");
        assert_eq!(staff.dept_id, None);

        let result = store
            .update_staff(
                &staff_id,
                &StaffPatch {
                    dept_id: Some(Some(DepartmentId::new("dept-x"))),
                    ..StaffPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn concurrent_posts_do_not_lose_updates() {
        let (store, _, staff_id) = store_with_one_collector().await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let staff_id = staff_id.clone();
            handles.push(tokio::spawn(async move {
                store.post_fee_entry(&staff_id, Amount::from_yuan(5)).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("post");
        }

        let data = store.snapshot().await;
        assert_eq!(data.staff[0].collected_amount, Amount::from_yuan(100));
        assert_eq!(data.records.len(), 20);
    }
}
