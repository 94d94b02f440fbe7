//! Aggregation rules shared by the dashboard, the chart series and the
//! insight digest.
//!
//! Everything here is a pure function of a [`DashboardData`] snapshot and is
//! recomputed on every read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{
    Amount, DashboardData, Department, DepartmentId, FeeRecordId, Staff, StaffId,
};

/// Display name used when there is no top performer.
pub const NO_TOP_PERFORMER: &str = "无";

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// `part / whole × 100`, rounded to two places; zero when `whole` is zero.
#[must_use]
pub fn percent(part: Amount, whole: Amount) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.as_decimal()
        .checked_div(whole.as_decimal())
        .and_then(|ratio| ratio.checked_mul(HUNDRED))
        .map_or(Decimal::ZERO, |p| p.round_dp(2).normalize())
}

/// The staff member with the highest collected amount.
///
/// Ties go to the smallest id so the answer does not depend on row order.
#[must_use]
pub fn top_performer(staff: &[Staff]) -> Option<&Staff> {
    staff.iter().max_by(|a, b| {
        a.collected_amount
            .cmp(&b.collected_amount)
            .then_with(|| b.id.cmp(&a.id))
    })
}

/// Summary of the top performer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub id: StaffId,
    pub name: String,
    pub amount: Amount,
}

/// Headline statistics for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_amount: Amount,
    pub total_target: Amount,
    /// Percent, two decimal places.
    pub completion_rate: Decimal,
    pub top_performer: Option<TopPerformer>,
    pub staff_count: usize,
    pub department_count: usize,
    pub record_count: usize,
}

impl DashboardStats {
    #[must_use]
    pub fn compute(data: &DashboardData) -> Self {
        let total_amount: Amount = data.staff.iter().map(|s| s.collected_amount).sum();
        let total_target: Amount = data.staff.iter().map(|s| s.target).sum();
        Self {
            total_amount,
            total_target,
            completion_rate: percent(total_amount, total_target),
            top_performer: top_performer(&data.staff).map(|s| TopPerformer {
                id: s.id.clone(),
                name: s.name.clone(),
                amount: s.collected_amount,
            }),
            staff_count: data.staff.len(),
            department_count: data.departments.len(),
            record_count: data.records.len(),
        }
    }

    /// Top performer name, or the `"无"` sentinel.
    #[must_use]
    pub fn top_performer_name(&self) -> &str {
        self.top_performer
            .as_ref()
            .map_or(NO_TOP_PERFORMER, |p| p.name.as_str())
    }
}

/// Per-department totals, in stored department order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRollup {
    pub id: DepartmentId,
    pub name: String,
    pub color: String,
    /// Sum of member staff collected amounts.
    pub amount: Amount,
    /// The department's own target when set, otherwise the sum of member targets.
    pub target: Amount,
    pub staff_count: usize,
    pub completion_rate: Decimal,
}

fn members<'a>(data: &'a DashboardData, dept: &'a Department) -> impl Iterator<Item = &'a Staff> {
    data.staff
        .iter()
        .filter(move |s| s.dept_id.as_ref() == Some(&dept.id))
}

/// Roll staff totals up to their departments. Unassigned staff are excluded.
#[must_use]
pub fn department_rollups(data: &DashboardData) -> Vec<DepartmentRollup> {
    data.departments
        .iter()
        .map(|dept| {
            let amount: Amount = members(data, dept).map(|s| s.collected_amount).sum();
            let target = dept
                .target_amount
                .unwrap_or_else(|| members(data, dept).map(|s| s.target).sum());
            DepartmentRollup {
                id: dept.id.clone(),
                name: dept.name.clone(),
                color: dept.color.clone(),
                amount,
                target,
                staff_count: members(data, dept).count(),
                completion_rate: percent(amount, target),
            }
        })
        .collect()
}

/// One row of the staff ranking chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRank {
    pub id: StaffId,
    pub name: String,
    pub department_name: Option<String>,
    pub amount: Amount,
    pub target: Amount,
}

/// Staff sorted by collected amount, highest first (ties by id).
#[must_use]
pub fn staff_ranking(data: &DashboardData) -> Vec<StaffRank> {
    let mut ranked: Vec<&Staff> = data.staff.iter().collect();
    ranked.sort_by(|a, b| {
        b.collected_amount
            .cmp(&a.collected_amount)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
        .into_iter()
        .map(|s| StaffRank {
            id: s.id.clone(),
            name: s.name.clone(),
            department_name: department_name(data, s),
            amount: s.collected_amount,
            target: s.target,
        })
        .collect()
}

/// Chart-ready series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub departments: Vec<DepartmentRollup>,
    pub staff_ranking: Vec<StaffRank>,
}

impl ChartSeries {
    #[must_use]
    pub fn compute(data: &DashboardData) -> Self {
        Self {
            departments: department_rollups(data),
            staff_ranking: staff_ranking(data),
        }
    }
}

/// A staff member's progress towards their target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProgress {
    pub id: StaffId,
    pub name: String,
    pub collected_amount: Amount,
    pub target: Amount,
    /// Percent, capped at 100.
    pub progress: Decimal,
}

/// A department with its staff, for the organization view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentNode {
    pub id: DepartmentId,
    pub name: String,
    pub color: String,
    pub total: Amount,
    pub staff: Vec<StaffProgress>,
}

/// Department → staff tree with capped progress.
#[must_use]
pub fn hierarchy(data: &DashboardData) -> Vec<DepartmentNode> {
    data.departments
        .iter()
        .map(|dept| {
            let staff: Vec<StaffProgress> = members(data, dept)
                .map(|s| StaffProgress {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    collected_amount: s.collected_amount,
                    target: s.target,
                    progress: percent(s.collected_amount, s.target).min(HUNDRED),
                })
                .collect();
            DepartmentNode {
                id: dept.id.clone(),
                name: dept.name.clone(),
                color: dept.color.clone(),
                total: staff.iter().map(|s| s.collected_amount).sum(),
                staff,
            }
        })
        .collect()
}

/// A fee record joined with its staff and department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFeedItem {
    pub id: FeeRecordId,
    pub staff_id: StaffId,
    pub staff_name: Option<String>,
    pub department_name: Option<String>,
    pub department_color: Option<String>,
    pub amount: Amount,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Records in stored (newest-first) order with display joins.
#[must_use]
pub fn record_feed(data: &DashboardData) -> Vec<RecordFeedItem> {
    data.records
        .iter()
        .map(|r| {
            let staff = data.staff_member(&r.staff_id);
            let dept = staff
                .and_then(|s| s.dept_id.as_ref())
                .and_then(|id| data.department(id));
            RecordFeedItem {
                id: r.id.clone(),
                staff_id: r.staff_id.clone(),
                staff_name: staff.map(|s| s.name.clone()),
                department_name: dept.map(|d| d.name.clone()),
                department_color: dept.map(|d| d.color.clone()),
                amount: r.amount,
                timestamp: r.timestamp,
            }
        })
        .collect()
}

fn department_name(data: &DashboardData, staff: &Staff) -> Option<String> {
    staff
        .dept_id
        .as_ref()
        .and_then(|id| data.department(id))
        .map(|d| d.name.clone())
}
