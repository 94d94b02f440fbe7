//! Integration tests for the dashboard state container.
//!
//! These drive `DashboardState` against the in-memory store and a store that
//! can be switched to fail.

use std::sync::Arc;

use propfee_admin::db::{FeeStore, MemoryStore};
use propfee_admin::services::{DashboardError, DashboardState, LoadState};
use propfee_core::{
    Amount, DashboardData, DepartmentId, NewStaff, StaffId, StaffPatch, ValidationError,
};
use propfee_integration_tests::{
    FlakyStore, StaticInsight, department, eventually, record, staff, two_collectors,
};

fn state_over(data: DashboardData) -> (DashboardState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_data(data));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));
    (state, store)
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_example_scenario() {
    let (state, _) = state_over(two_collectors());
    state.load().await.unwrap();

    let stats = state.stats().await;
    assert_eq!(stats.total_amount, Amount::from_yuan(250));
    assert_eq!(stats.total_target, Amount::from_yuan(400));
    assert_eq!(stats.completion_rate.to_string(), "62.5");
    assert_eq!(stats.top_performer_name(), "B");

    let posted = state
        .post_fee(&StaffId::new("a"), Amount::from_yuan(50))
        .await
        .unwrap();
    assert_eq!(posted.collected_amount, Amount::from_yuan(150));

    let view = state.view().await;
    assert_eq!(view.stats.total_amount, Amount::from_yuan(300));
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].id, posted.record.id);
    assert_eq!(view.records[0].staff_name.as_deref(), Some("A"));
    assert_eq!(view.records[0].department_name.as_deref(), Some("住宅一部"));
}

#[tokio::test]
async fn test_empty_dashboard_stats() {
    let (state, _) = state_over(DashboardData::default());
    state.load().await.unwrap();

    let stats = state.stats().await;
    assert_eq!(stats.total_amount, Amount::ZERO);
    assert!(stats.completion_rate.is_zero());
    assert_eq!(stats.top_performer_name(), "无");
}

#[tokio::test]
async fn test_new_record_is_first_in_feed() {
    let mut data = two_collectors();
    data.records = vec![record("fee-old", "b", 20)];
    let (state, _) = state_over(data);
    state.load().await.unwrap();

    let posted = state
        .post_fee(&StaffId::new("b"), Amount::parse("12.5").unwrap())
        .await
        .unwrap();

    let records = state.data().await.records;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, posted.record.id);
    assert_eq!(records[1].id.as_str(), "fee-old");
}

#[tokio::test]
async fn test_charts_and_hierarchy_views() {
    let mut data = two_collectors();
    data.staff.push(staff("c", "C", None, 500, 0));
    let (state, _) = state_over(data);
    state.load().await.unwrap();

    let charts = state.charts().await;
    assert_eq!(charts.departments.len(), 1);
    // Unassigned staff are left out of the department share.
    assert_eq!(charts.departments[0].amount, Amount::from_yuan(250));
    assert_eq!(charts.staff_ranking[0].name, "C");
    assert_eq!(charts.staff_ranking[0].department_name, None);

    let tree = state.hierarchy().await;
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].staff.len(), 2);
    assert_eq!(tree[0].total, Amount::from_yuan(250));
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_delete_staff_removes_their_records() {
    let mut data = two_collectors();
    data.records = vec![record("fee-1", "a", 10), record("fee-2", "b", 10)];
    let (state, store) = state_over(data);
    state.load().await.unwrap();

    state.delete_staff(&StaffId::new("a")).await.unwrap();

    let local = state.data().await;
    assert_eq!(local.staff.len(), 1);
    assert_eq!(local.records.len(), 1);
    assert_eq!(local.records[0].staff_id.as_str(), "b");
    assert_eq!(store.snapshot().await.records.len(), 1);
}

#[tokio::test]
async fn test_delete_department_orphans_staff() {
    let mut data = two_collectors();
    data.records = vec![record("fee-1", "a", 10)];
    let (state, _) = state_over(data);
    state.load().await.unwrap();

    state
        .delete_department(&DepartmentId::new("dept-1"))
        .await
        .unwrap();

    let local = state.data().await;
    assert!(local.departments.is_empty());
    assert!(local.staff.iter().all(|s| s.dept_id.is_none()));
    assert_eq!(local.records.len(), 1);

    let feed = state.view().await.records;
    assert_eq!(feed[0].department_name, None);
    assert_eq!(feed[0].staff_name.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_invalid_input_never_reaches_store() {
    let (state, store) = state_over(two_collectors());
    state.load().await.unwrap();

    let result = state
        .register_staff(NewStaff {
            name: "   ".to_owned(),
            dept_id: DepartmentId::new("dept-1"),
            target: Amount::ZERO,
        })
        .await;
    assert!(matches!(
        result,
        Err(DashboardError::Validation(ValidationError::EmptyName(_)))
    ));

    let result = state.post_fee(&StaffId::new("a"), Amount::ZERO).await;
    assert!(matches!(result, Err(DashboardError::Amount(_))));

    assert_eq!(store.snapshot().await.staff.len(), 2);
    assert!(store.snapshot().await.records.is_empty());
}

#[tokio::test]
async fn test_staff_total_correction() {
    let (state, _) = state_over(two_collectors());
    state.load().await.unwrap();

    let updated = state
        .update_staff(
            &StaffId::new("a"),
            StaffPatch {
                collected_amount: Some(Amount::from_yuan(90)),
                ..StaffPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.collected_amount, Amount::from_yuan(90));
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(240));
}

// =============================================================================
// Load, failure and reconcile
// =============================================================================

#[tokio::test]
async fn test_failed_load_can_be_retried() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));

    store.set_failing(true);
    assert!(state.load().await.is_err());
    assert!(matches!(state.load_state().await, LoadState::Failed(_)));

    store.set_failing(false);
    state.load().await.unwrap();
    assert_eq!(state.load_state().await, LoadState::Ready);
    assert_eq!(state.staff().await.len(), 2);
}

#[tokio::test]
async fn test_store_failure_surfaces_and_keeps_local_state() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));
    state.load().await.unwrap();

    store.set_failing(true);
    let err = state
        .post_fee(&StaffId::new("a"), Amount::from_yuan(10))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "保存失败，请检查网络或配置");

    let err = state.delete_staff(&StaffId::new("a")).await.unwrap_err();
    assert!(matches!(err, DashboardError::Store(_)));

    assert!(state.reconcile().await.is_err());
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(250));
    assert_eq!(state.staff().await.len(), 2);
}

#[tokio::test]
async fn test_reconcile_picks_up_other_writers() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));
    state.load().await.unwrap();

    store
        .inner()
        .post_fee_entry(&StaffId::new("b"), Amount::from_yuan(25))
        .await
        .unwrap();

    let report = state.reconcile().await.unwrap();
    assert_eq!(report.diverged, 1);
    assert_eq!(report.staff_count, 2);
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(275));
    assert_eq!(state.data().await.records.len(), 1);

    let report = state.reconcile().await.unwrap();
    assert_eq!(report.diverged, 0);
}

#[tokio::test]
async fn test_reconcile_keeps_post_that_lands_mid_fetch() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));
    state.load().await.unwrap();

    store.hold_next_fetch();
    let reconcile = tokio::spawn({
        let state = state.clone();
        async move { state.reconcile().await }
    });
    store.fetch_parked().await;

    let posted = state
        .post_fee(&StaffId::new("a"), Amount::from_yuan(50))
        .await
        .unwrap();
    assert_eq!(posted.collected_amount, Amount::from_yuan(150));
    store.release_fetch();

    let report = reconcile.await.unwrap().unwrap();
    assert_eq!(report.diverged, 0);

    let local = state.data().await;
    assert_eq!(local.records.len(), 1);
    assert_eq!(local.records[0].id, posted.record.id);
    let a = local.staff_member(&StaffId::new("a")).unwrap();
    assert_eq!(a.collected_amount, Amount::from_yuan(150));
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(300));
}

#[tokio::test]
async fn test_initial_load_refetches_after_concurrent_post() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));

    store.hold_next_fetch();
    let load = tokio::spawn({
        let state = state.clone();
        async move { state.load().await }
    });
    store.fetch_parked().await;

    let posted = state
        .post_fee(&StaffId::new("b"), Amount::from_yuan(30))
        .await
        .unwrap();
    store.release_fetch();
    load.await.unwrap().unwrap();

    let local = state.data().await;
    assert_eq!(state.load_state().await, LoadState::Ready);
    assert_eq!(local.records.len(), 1);
    assert_eq!(local.records[0].id, posted.record.id);
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(280));
}

#[tokio::test]
async fn test_reconcile_gives_up_when_writes_keep_landing() {
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), Arc::new(StaticInsight::new("建议")));
    state.load().await.unwrap();

    store.hold_next_fetch();
    let reconcile = tokio::spawn({
        let state = state.clone();
        async move { state.reconcile().await }
    });
    for round in 0..3 {
        store.fetch_parked().await;
        state
            .post_fee(&StaffId::new("a"), Amount::from_yuan(10))
            .await
            .unwrap();
        if round < 2 {
            store.hold_next_fetch();
        }
        store.release_fetch();
    }

    let err = reconcile.await.unwrap().unwrap_err();
    assert!(matches!(err, DashboardError::Contended));
    assert_eq!(err.user_message(), "数据正在更新，请稍后重试");

    // Every post is still reflected locally.
    let local = state.data().await;
    assert_eq!(local.records.len(), 3);
    assert_eq!(state.stats().await.total_amount, Amount::from_yuan(280));
}

// =============================================================================
// Insight triggers
// =============================================================================

#[tokio::test]
async fn test_recovered_load_refreshes_insight() {
    let insight = Arc::new(StaticInsight::new("恢复后建议"));
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), insight.clone());

    store.set_failing(true);
    assert!(state.initialize().await.is_err());
    assert_eq!(insight.calls(), 0);

    store.set_failing(false);
    state.reconcile().await.unwrap();

    assert!(
        eventually(|| {
            let state = state.clone();
            async move { state.insight().await.text == "恢复后建议" }
        })
        .await
    );
    assert_eq!(insight.calls(), 1);

    // Staff was already present, so a second pass does not refresh again.
    state.reconcile().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(insight.calls(), 1);
}

#[tokio::test]
async fn test_retried_load_refreshes_insight() {
    let insight = Arc::new(StaticInsight::new("重新加载"));
    let store = Arc::new(FlakyStore::new(two_collectors()));
    let state = DashboardState::new(store.clone(), insight.clone());

    store.set_failing(true);
    assert!(state.load().await.is_err());
    store.set_failing(false);
    state.load().await.unwrap();

    assert!(
        eventually(|| {
            let state = state.clone();
            async move { state.insight().await.text == "重新加载" }
        })
        .await
    );
}

#[tokio::test]
async fn test_initialize_refreshes_insight_when_staff_exist() {
    let insight = Arc::new(StaticInsight::new("收缴进度良好"));
    let state = DashboardState::new(
        Arc::new(MemoryStore::with_data(two_collectors())),
        insight.clone(),
    );

    state.initialize().await.unwrap();

    assert_eq!(insight.calls(), 1);
    assert_eq!(state.insight().await.text, "收缴进度良好");
}

#[tokio::test]
async fn test_first_staff_registration_triggers_insight() {
    let insight = Arc::new(StaticInsight::new("首位人员"));
    let data = DashboardData {
        departments: vec![department("dept-1", "住宅一部")],
        ..DashboardData::default()
    };
    let state = DashboardState::new(Arc::new(MemoryStore::with_data(data)), insight.clone());
    state.initialize().await.unwrap();
    assert_eq!(insight.calls(), 0);

    state
        .register_staff(NewStaff {
            name: "张伟".to_owned(),
            dept_id: DepartmentId::new("dept-1"),
            target: Amount::from_yuan(100),
        })
        .await
        .unwrap();

    assert!(
        eventually(|| {
            let state = state.clone();
            async move { state.insight().await.text == "首位人员" }
        })
        .await
    );

    // A second registration does not trigger another refresh.
    state
        .register_staff(NewStaff {
            name: "李强".to_owned(),
            dept_id: DepartmentId::new("dept-1"),
            target: Amount::from_yuan(100),
        })
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(insight.calls(), 1);
}
