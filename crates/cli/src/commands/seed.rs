//! Seed the database with the demo departments and staff.
//!
//! Does nothing when any department already exists, so it is safe to re-run.

use propfee_admin::db::{DepartmentRepository, StaffRepository};
use propfee_core::{Amount, DepartmentId, NewDepartment, NewStaff, StaffId};

/// `(id, name, color)`
const DEMO_DEPARTMENTS: [(&str, &str, &str); 4] = [
    ("dept-1", "住宅一部", "#6366f1"),
    ("dept-2", "住宅二部", "#10b981"),
    ("dept-3", "商业运营部", "#f59e0b"),
    ("dept-4", "特约服务部", "#ec4899"),
];

/// `(id, name, department, collected, target)`
const DEMO_STAFF: [(&str, &str, &str, u32, u32); 9] = [
    ("s1", "张伟", "dept-1", 12_500, 20_000),
    ("s2", "李强", "dept-1", 8_400, 15_000),
    ("s3", "王丽", "dept-1", 15_600, 22_000),
    ("s4", "赵敏", "dept-2", 21_000, 25_000),
    ("s5", "孙晨", "dept-2", 18_200, 20_000),
    ("s6", "周杰", "dept-3", 45_000, 50_000),
    ("s7", "吴磊", "dept-3", 32_000, 40_000),
    ("s8", "郑华", "dept-4", 12_000, 15_000),
    ("s9", "冯媛", "dept-4", 9_800, 12_000),
];

/// Insert the demo data if the departments table is empty.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a query fails.
pub async fn demo_data() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let departments = DepartmentRepository::new(&pool);
    let existing = departments.count().await?;
    if existing > 0 {
        tracing::info!(existing, "Departments already present, skipping seed");
        return Ok(());
    }

    for (id, name, color) in DEMO_DEPARTMENTS {
        let input = NewDepartment {
            name: name.to_owned(),
            color: color.to_owned(),
            target_amount: None,
        };
        departments.insert(&DepartmentId::new(id), &input).await?;
    }

    let staff = StaffRepository::new(&pool);
    for (id, name, dept_id, collected, target) in DEMO_STAFF {
        let input = NewStaff {
            name: name.to_owned(),
            dept_id: DepartmentId::new(dept_id),
            target: Amount::from_yuan(target),
        };
        staff
            .insert(&StaffId::new(id), &input, Amount::from_yuan(collected))
            .await?;
    }

    tracing::info!(
        departments = DEMO_DEPARTMENTS.len(),
        staff = DEMO_STAFF.len(),
        "Demo data seeded"
    );
    Ok(())
}
