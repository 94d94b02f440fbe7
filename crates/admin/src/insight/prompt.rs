//! Prompt construction for collection-trend insights.

use std::fmt::Write as _;

use propfee_core::{DashboardData, NO_TOP_PERFORMER, department_rollups, top_performer};

/// Department totals as `"{name}: 总额 {total}元"`, joined by `", "`.
#[must_use]
pub fn department_digest(data: &DashboardData) -> String {
    department_rollups(data)
        .iter()
        .map(|d| format!("{}: 总额 {}元", d.name, d.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"{name} ({amount}元)"` for the top performer, or `"无"`.
#[must_use]
pub fn top_performer_digest(data: &DashboardData) -> String {
    top_performer(&data.staff).map_or_else(
        || NO_TOP_PERFORMER.to_owned(),
        |s| format!("{} ({}元)", s.name, s.collected_amount),
    )
}

/// Build the full analysis prompt.
#[must_use]
pub fn build_prompt(data: &DashboardData) -> String {
    let mut prompt = String::new();
    prompt.push_str("作为物业财务专家，请分析以下今日收费数据并给出3条简短的运营建议（中文）：\n");
    let _ = writeln!(prompt, "数据概览：{}", department_digest(data));
    let _ = writeln!(prompt, "表现最好的人员：{}", top_performer_digest(data));
    prompt.push('\n');
    prompt.push_str("请重点关注：\n");
    prompt.push_str("1. 部门间的收费差异。\n");
    prompt.push_str("2. 完成率较低的潜在风险。\n");
    prompt.push_str("3. 激励措施建议。\n");
    prompt.push('\n');
    prompt.push_str("请直接给出建议列表，不要有多余的客套话。");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use propfee_core::{Amount, Department, DepartmentId, Staff, StaffId};

    fn data() -> DashboardData {
        DashboardData {
            departments: vec![
                Department {
                    id: DepartmentId::new("dept-1"),
                    name: "住宅一部".to_owned(),
                    color: "#6366f1".to_owned(),
                    target_amount: None,
                },
                Department {
                    id: DepartmentId::new("dept-2"),
                    name: "住宅二部".to_owned(),
                    color: "#10b981".to_owned(),
                    target_amount: None,
                },
            ],
            staff: vec![
                Staff {
                    id: StaffId::new("s1"),
                    name: "张伟".to_owned(),
                    dept_id: Some(DepartmentId::new("dept-1")),
                    collected_amount: Amount::from_yuan(12_500),
                    target: Amount::from_yuan(20_000),
                },
                Staff {
                    id: StaffId::new("s4"),
                    name: "赵敏".to_owned(),
                    dept_id: Some(DepartmentId::new("dept-2")),
                    collected_amount: Amount::from_yuan(21_000),
                    target: Amount::from_yuan(25_000),
                },
            ],
            records: Vec::new(),
        }
    }

    #[test]
    fn digest_lists_departments_in_order() {
        assert_eq!(
            department_digest(&data()),
            "住宅一部: 总额 12500元, 住宅二部: 总额 21000元"
        );
    }

    #[test]
    fn top_performer_line() {
        assert_eq!(top_performer_digest(&data()), "赵敏 (21000元)");
        assert_eq!(top_performer_digest(&DashboardData::default()), "无");
    }

    #[test]
    fn prompt_contains_digest_and_focus_areas() {
        let prompt = build_prompt(&data());
        assert!(prompt.contains("数据概览：住宅一部: 总额 12500元"));
        assert!(prompt.contains("表现最好的人员：赵敏 (21000元)"));
        assert!(prompt.contains("1. 部门间的收费差异。"));
        assert!(prompt.contains("3. 激励措施建议。"));
    }
}
