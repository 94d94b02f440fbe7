//! Dashboard state container.
//!
//! Holds the canonical in-memory copy of departments, staff and records,
//! derives statistics on every read, and funnels every mutation through the
//! store before patching local state. Locks are never held across store or
//! insight I/O.
//!
//! Every action surfaces failure the same way: it logs, and returns a
//! [`DashboardError`] whose [`DashboardError::user_message`] is safe to show.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use propfee_core::{
    Amount, AmountError, ChartSeries, DashboardData, DashboardStats, Department, DepartmentId,
    DepartmentNode, DepartmentPatch, NewDepartment, NewStaff, RecordFeedItem, Staff, StaffId,
    StaffPatch, ValidationError, hierarchy, record_feed,
};

use crate::db::{FeeStore, PostedFee, RepositoryError};
use crate::insight::{INSIGHT_INITIAL, InsightProvider};

/// Message shown when a write could not be saved.
pub const SAVE_FAILED_MESSAGE: &str = "保存失败，请检查网络或配置";

/// Message shown when the initial load failed.
pub const LOAD_FAILED_MESSAGE: &str = "数据加载失败，请检查网络或配置";

/// Message shown when a reload kept racing local writes.
pub const CONTENDED_MESSAGE: &str = "数据正在更新，请稍后重试";

/// Store fetches per reload before giving up on a moving target.
const RELOAD_ATTEMPTS: usize = 3;

/// Errors returned by dashboard actions.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Input rejected before reaching the store.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Amount rejected before reaching the store.
    #[error("invalid amount: {0}")]
    Amount(#[from] AmountError),

    /// The referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The store refused the write (e.g., unknown department).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or failed.
    #[error("store error: {0}")]
    Store(#[source] RepositoryError),

    /// Every reload attempt overlapped a local write; local state was kept.
    #[error("collections changed during reload")]
    Contended,
}

impl DashboardError {
    fn from_store(e: RepositoryError, entity: &'static str) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound(entity),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }

    /// Text safe to show to a user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(_) => SAVE_FAILED_MESSAGE.to_owned(),
            Self::Contended => CONTENDED_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }
}

/// Whether the collections have been loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Ready,
    /// The last load failed; `load()` may be retried.
    Failed(String),
}

/// Result of an insight refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightOutcome {
    /// No staff, nothing to analyze.
    Skipped,
    /// Another refresh is still in flight.
    Busy,
    /// New text stored.
    Updated(String),
}

/// Outcome of a reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Staff whose local collected total differed from the store's.
    pub diverged: usize,
    pub staff_count: usize,
}

/// Current insight text plus the in-flight flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightView {
    pub text: String,
    pub busy: bool,
}

/// Everything the dashboard page shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub load_state: LoadState,
    pub stats: DashboardStats,
    pub records: Vec<RecordFeedItem>,
    pub insight: InsightView,
}

struct Snapshot {
    load_state: LoadState,
    data: DashboardData,
    /// Bumped by every local patch. A reload only lands if this is unchanged
    /// since its fetch started.
    generation: u64,
}

/// What a reload swapped in.
struct Reloaded {
    diverged: usize,
    staff_count: usize,
    /// Staff went from empty to non-empty.
    populated: bool,
}

/// Shared dashboard state. Cheap to clone.
#[derive(Clone)]
pub struct DashboardState {
    inner: Arc<DashboardStateInner>,
}

struct DashboardStateInner {
    store: Arc<dyn FeeStore>,
    insight: Arc<dyn InsightProvider>,
    snapshot: RwLock<Snapshot>,
    insight_text: RwLock<String>,
    insight_busy: AtomicBool,
}

/// Clears the busy flag when the refresh ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DashboardState {
    /// Create an empty container in the `Loading` state.
    #[must_use]
    pub fn new(store: Arc<dyn FeeStore>, insight: Arc<dyn InsightProvider>) -> Self {
        Self {
            inner: Arc::new(DashboardStateInner {
                store,
                insight,
                snapshot: RwLock::new(Snapshot {
                    load_state: LoadState::Loading,
                    data: DashboardData::default(),
                    generation: 0,
                }),
                insight_text: RwLock::new(INSIGHT_INITIAL.to_owned()),
                insight_busy: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Replace the collections with a fresh copy from the store.
    ///
    /// On failure the state becomes `Failed` and the error is returned. If
    /// staff goes from empty to non-empty, an insight refresh is started in
    /// the background.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Store` if the fetch fails.
    pub async fn load(&self) -> Result<(), DashboardError> {
        if self.load_collections().await? {
            self.spawn_insight_refresh();
        }
        Ok(())
    }

    /// Load, then refresh the insight if there is anyone to analyze.
    ///
    /// # Errors
    ///
    /// Returns the load error; the insight refresh cannot fail.
    pub async fn initialize(&self) -> Result<(), DashboardError> {
        self.load_collections().await?;
        self.refresh_insight().await;
        Ok(())
    }

    /// Re-fetch from the store and replace local state.
    ///
    /// Local state is kept if the fetch fails.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Store` if the fetch fails and
    /// `DashboardError::Contended` if local writes kept landing mid-fetch.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, DashboardError> {
        let reloaded = self.reload().await.map_err(|e| {
            tracing::error!(error = %e, "Reconcile failed");
            e
        })?;

        if reloaded.diverged > 0 {
            tracing::warn!(
                diverged = reloaded.diverged,
                "Local staff totals diverged from the store"
            );
        } else {
            tracing::debug!("Reconcile found no divergence");
        }
        if reloaded.populated {
            self.spawn_insight_refresh();
        }

        Ok(ReconcileReport {
            diverged: reloaded.diverged,
            staff_count: reloaded.staff_count,
        })
    }

    /// Load and track the outcome in `load_state`. Returns whether staff
    /// went from empty to non-empty.
    #[instrument(skip(self))]
    async fn load_collections(&self) -> Result<bool, DashboardError> {
        match self.reload().await {
            Ok(reloaded) => {
                tracing::info!(staff = reloaded.staff_count, "Dashboard data loaded");
                Ok(reloaded.populated)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load dashboard data");
                self.inner.snapshot.write().await.load_state =
                    LoadState::Failed(LOAD_FAILED_MESSAGE.to_owned());
                Err(e)
            }
        }
    }

    /// Fetch from the store and swap the result in, fetching again when a
    /// local write landed while the fetch was in flight.
    async fn reload(&self) -> Result<Reloaded, DashboardError> {
        for attempt in 1..=RELOAD_ATTEMPTS {
            let started_at = self.inner.snapshot.read().await.generation;
            let fresh = self
                .inner
                .store
                .fetch_all()
                .await
                .map_err(DashboardError::Store)?;

            let mut snapshot = self.inner.snapshot.write().await;
            if snapshot.generation != started_at {
                tracing::debug!(attempt, "Local write during fetch, fetching again");
                continue;
            }

            let diverged = fresh
                .staff
                .iter()
                .filter(|s| {
                    snapshot
                        .data
                        .staff_member(&s.id)
                        .is_none_or(|local| local.collected_amount != s.collected_amount)
                })
                .count();
            let reloaded = Reloaded {
                diverged,
                staff_count: fresh.staff.len(),
                populated: snapshot.data.staff.is_empty() && !fresh.staff.is_empty(),
            };
            snapshot.data = fresh;
            snapshot.load_state = LoadState::Ready;
            return Ok(reloaded);
        }

        Err(DashboardError::Contended)
    }

    /// Apply a patch to local collections, marking in-flight reloads stale.
    async fn patch_local<R>(&self, patch: impl FnOnce(&mut DashboardData) -> R) -> R {
        let mut snapshot = self.inner.snapshot.write().await;
        snapshot.generation = snapshot.generation.wrapping_add(1);
        patch(&mut snapshot.data)
    }

    fn spawn_insight_refresh(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            this.refresh_insight().await;
        });
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Copy of the current collections.
    pub async fn data(&self) -> DashboardData {
        self.inner.snapshot.read().await.data.clone()
    }

    pub async fn load_state(&self) -> LoadState {
        self.inner.snapshot.read().await.load_state.clone()
    }

    pub async fn stats(&self) -> DashboardStats {
        DashboardStats::compute(&self.inner.snapshot.read().await.data)
    }

    pub async fn charts(&self) -> ChartSeries {
        ChartSeries::compute(&self.inner.snapshot.read().await.data)
    }

    pub async fn hierarchy(&self) -> Vec<DepartmentNode> {
        hierarchy(&self.inner.snapshot.read().await.data)
    }

    pub async fn departments(&self) -> Vec<Department> {
        self.inner.snapshot.read().await.data.departments.clone()
    }

    pub async fn staff(&self) -> Vec<Staff> {
        self.inner.snapshot.read().await.data.staff.clone()
    }

    pub async fn insight(&self) -> InsightView {
        InsightView {
            text: self.inner.insight_text.read().await.clone(),
            busy: self.is_insight_busy(),
        }
    }

    #[must_use]
    pub fn is_insight_busy(&self) -> bool {
        self.inner.insight_busy.load(Ordering::Acquire)
    }

    /// Load state, stats, record feed and insight in one read.
    pub async fn view(&self) -> DashboardView {
        let (load_state, stats, records) = {
            let snapshot = self.inner.snapshot.read().await;
            (
                snapshot.load_state.clone(),
                DashboardStats::compute(&snapshot.data),
                record_feed(&snapshot.data),
            )
        };
        DashboardView {
            load_state,
            stats,
            records,
            insight: self.insight().await,
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Post a fee entry for a staff member.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Amount` for a zero amount, `NotFound` for an
    /// unknown staff member, `Store` if the write fails.
    #[instrument(skip(self), fields(staff_id = %staff_id, amount = %amount))]
    pub async fn post_fee(
        &self,
        staff_id: &StaffId,
        amount: Amount,
    ) -> Result<PostedFee, DashboardError> {
        let amount = amount.require_positive()?;
        let posted = self
            .inner
            .store
            .post_fee_entry(staff_id, amount)
            .await
            .map_err(|e| failed("post fee", DashboardError::from_store(e, "staff member")))?;

        self.patch_local(|data| {
            // A reload that started after the store write already has it.
            if data.records.iter().any(|r| r.id == posted.record.id) {
                return;
            }
            if let Some(staff) = data.staff.iter_mut().find(|s| &s.id == staff_id) {
                staff.collected_amount = posted.collected_amount;
            }
            data.records.insert(0, posted.record.clone());
        })
        .await;

        tracing::info!(record_id = %posted.record.id, total = %posted.collected_amount, "Fee posted");
        Ok(posted)
    }

    /// Register a department.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Validation` for bad input, `Store` if the
    /// write fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register_department(
        &self,
        input: NewDepartment,
    ) -> Result<Department, DashboardError> {
        let input = input.validated()?;
        let department = self
            .inner
            .store
            .register_department(&input)
            .await
            .map_err(|e| failed("register department", DashboardError::from_store(e, "department")))?;

        self.patch_local(|data| {
            if data.department(&department.id).is_none() {
                data.departments.push(department.clone());
            }
        })
        .await;
        Ok(department)
    }

    /// Edit a department.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` for an unknown id.
    #[instrument(skip(self, patch), fields(department_id = %id))]
    pub async fn update_department(
        &self,
        id: &DepartmentId,
        patch: DepartmentPatch,
    ) -> Result<Department, DashboardError> {
        let patch = patch.validated()?;
        let department = self
            .inner
            .store
            .update_department(id, &patch)
            .await
            .map_err(|e| failed("update department", DashboardError::from_store(e, "department")))?;

        self.patch_local(|data| {
            if let Some(local) = data.departments.iter_mut().find(|d| &d.id == id) {
                *local = department.clone();
            }
        })
        .await;
        Ok(department)
    }

    /// Delete a department. Its staff stay, unassigned, with their records.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(department_id = %id))]
    pub async fn delete_department(&self, id: &DepartmentId) -> Result<(), DashboardError> {
        self.inner
            .store
            .delete_department(id)
            .await
            .map_err(|e| failed("delete department", DashboardError::from_store(e, "department")))?;

        self.patch_local(|data| {
            data.departments.retain(|d| &d.id != id);
            for staff in &mut data.staff {
                if staff.dept_id.as_ref() == Some(id) {
                    staff.dept_id = None;
                }
            }
        })
        .await;
        Ok(())
    }

    /// Register a staff member. The first registration triggers an insight
    /// refresh in the background.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Conflict` for an unknown department.
    #[instrument(skip(self, input), fields(name = %input.name, department_id = %input.dept_id))]
    pub async fn register_staff(&self, input: NewStaff) -> Result<Staff, DashboardError> {
        let input = input.validated()?;
        let staff = self
            .inner
            .store
            .register_staff(&input)
            .await
            .map_err(|e| failed("register staff", DashboardError::from_store(e, "staff member")))?;

        let populated = self
            .patch_local(|data| {
                if data.staff_member(&staff.id).is_some() {
                    return false;
                }
                let was_empty = data.staff.is_empty();
                data.staff.push(staff.clone());
                was_empty
            })
            .await;

        if populated {
            self.spawn_insight_refresh();
        }
        Ok(staff)
    }

    /// Edit a staff member (including a direct collected-total correction).
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` for an unknown id.
    #[instrument(skip(self, patch), fields(staff_id = %id))]
    pub async fn update_staff(
        &self,
        id: &StaffId,
        patch: StaffPatch,
    ) -> Result<Staff, DashboardError> {
        let patch = patch.validated()?;
        let staff = self
            .inner
            .store
            .update_staff(id, &patch)
            .await
            .map_err(|e| failed("update staff", DashboardError::from_store(e, "staff member")))?;

        self.patch_local(|data| {
            if let Some(local) = data.staff.iter_mut().find(|s| &s.id == id) {
                *local = staff.clone();
            }
        })
        .await;
        Ok(staff)
    }

    /// Delete a staff member and every record that references them.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(staff_id = %id))]
    pub async fn delete_staff(&self, id: &StaffId) -> Result<(), DashboardError> {
        self.inner
            .store
            .delete_staff(id)
            .await
            .map_err(|e| failed("delete staff", DashboardError::from_store(e, "staff member")))?;

        self.patch_local(|data| {
            data.staff.retain(|s| &s.id != id);
            data.records.retain(|r| &r.staff_id != id);
        })
        .await;
        Ok(())
    }

    // =========================================================================
    // Insight
    // =========================================================================

    /// Ask the insight provider for fresh text.
    ///
    /// Skipped when there are no staff; returns `Busy` while another refresh
    /// is in flight. In-flight refreshes are never cancelled.
    #[instrument(skip(self))]
    pub async fn refresh_insight(&self) -> InsightOutcome {
        let data = {
            let snapshot = self.inner.snapshot.read().await;
            if snapshot.data.staff.is_empty() {
                return InsightOutcome::Skipped;
            }
            snapshot.data.clone()
        };

        if self
            .inner
            .insight_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Insight refresh already in flight");
            return InsightOutcome::Busy;
        }
        let _guard = BusyGuard(&self.inner.insight_busy);

        let text = self.inner.insight.summarize(&data).await;
        self.inner.insight_text.write().await.clone_from(&text);
        tracing::info!(chars = text.chars().count(), "Insight refreshed");
        InsightOutcome::Updated(text)
    }
}

/// Log a failed action and pass the error through.
fn failed(action: &'static str, error: DashboardError) -> DashboardError {
    match &error {
        DashboardError::Store(e) => tracing::error!(action, error = %e, "Dashboard action failed"),
        other => tracing::warn!(action, error = %other, "Dashboard action rejected"),
    }
    error
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::MemoryStore;

    struct EchoInsight;

    #[async_trait]
    impl InsightProvider for EchoInsight {
        async fn summarize(&self, data: &DashboardData) -> String {
            format!("{} staff", data.staff.len())
        }
    }

    async fn state_with(names: &[(&str, u32, u32)]) -> (DashboardState, DepartmentId) {
        let state = DashboardState::new(Arc::new(MemoryStore::new()), Arc::new(EchoInsight));
        state.load().await.expect("load");
        let dept = state
            .register_department(NewDepartment {
                name: "一部".to_owned(),
                color: "#6366f1".to_owned(),
                target_amount: None,
            })
            .await
            .expect("department");
        for (name, collected, target) in names {
            let staff = state
                .register_staff(NewStaff {
                    name: (*name).to_owned(),
                    dept_id: dept.id.clone(),
                    target: Amount::from_yuan(*target),
                })
                .await
                .expect("staff");
            if *collected > 0 {
                state
                    .post_fee(&staff.id, Amount::from_yuan(*collected))
                    .await
                    .expect("post");
            }
        }
        (state, dept.id)
    }

    #[tokio::test]
    async fn starts_loading_with_initial_insight() {
        let state = DashboardState::new(Arc::new(MemoryStore::new()), Arc::new(EchoInsight));
        assert_eq!(state.load_state().await, LoadState::Loading);
        assert_eq!(state.insight().await.text, INSIGHT_INITIAL);
    }

    #[tokio::test]
    async fn post_fee_updates_total_and_feed() {
        let (state, _) = state_with(&[("A", 100, 200), ("B", 150, 200)]).await;
        let a = state.staff().await[0].id.clone();

        let posted = state.post_fee(&a, Amount::from_yuan(50)).await.expect("post");

        assert_eq!(posted.collected_amount, Amount::from_yuan(150));
        let stats = state.stats().await;
        assert_eq!(stats.total_amount, Amount::from_yuan(300));
        let view = state.view().await;
        assert_eq!(view.records[0].id, posted.record.id);
        assert_eq!(view.records.len(), 3);
    }

    #[tokio::test]
    async fn zero_fee_is_rejected_before_the_store() {
        let (state, _) = state_with(&[("A", 0, 200)]).await;
        let a = state.staff().await[0].id.clone();
        let result = state.post_fee(&a, Amount::ZERO).await;
        assert!(matches!(
            result,
            Err(DashboardError::Amount(AmountError::NotPositive))
        ));
        assert!(state.data().await.records.is_empty());
    }

    #[tokio::test]
    async fn unknown_staff_is_not_found() {
        let (state, _) = state_with(&[]).await;
        let result = state
            .post_fee(&StaffId::new("ghost"), Amount::from_yuan(1))
            .await;
        assert!(matches!(result, Err(DashboardError::NotFound("staff member"))));
    }

    #[tokio::test]
    async fn delete_department_orphans_staff_locally() {
        let (state, dept_id) = state_with(&[("A", 10, 100)]).await;
        state.delete_department(&dept_id).await.expect("delete");

        let data = state.data().await;
        assert!(data.departments.is_empty());
        assert_eq!(data.staff[0].dept_id, None);
        assert_eq!(data.records.len(), 1);
    }

    #[tokio::test]
    async fn delete_staff_drops_their_records_locally() {
        let (state, _) = state_with(&[("A", 10, 100), ("B", 20, 100)]).await;
        let a = state.staff().await[0].id.clone();
        state.delete_staff(&a).await.expect("delete");

        let data = state.data().await;
        assert_eq!(data.staff.len(), 1);
        assert!(data.records.iter().all(|r| r.staff_id != a));
        assert_eq!(data.records.len(), 1);
    }

    #[tokio::test]
    async fn insight_refresh_skips_without_staff() {
        let (state, _) = state_with(&[]).await;
        assert_eq!(state.refresh_insight().await, InsightOutcome::Skipped);
        assert_eq!(state.insight().await.text, INSIGHT_INITIAL);
    }

    #[tokio::test]
    async fn insight_refresh_stores_text() {
        let (state, _) = state_with(&[("A", 10, 100), ("B", 20, 100)]).await;
        assert_eq!(
            state.refresh_insight().await,
            InsightOutcome::Updated("2 staff".to_owned())
        );
        let insight = state.insight().await;
        assert_eq!(insight.text, "2 staff");
        assert!(!insight.busy);
    }

    #[tokio::test]
    async fn reconcile_reports_divergence() {
        let store = Arc::new(MemoryStore::new());
        let state = DashboardState::new(store.clone(), Arc::new(EchoInsight));
        let dept = state
            .register_department(NewDepartment {
                name: "一部".to_owned(),
                color: "#6366f1".to_owned(),
                target_amount: None,
            })
            .await
            .expect("department");
        let staff = state
            .register_staff(NewStaff {
                name: "A".to_owned(),
                dept_id: dept.id,
                target: Amount::from_yuan(100),
            })
            .await
            .expect("staff");

        // Another writer posts directly to the store.
        store
            .post_fee_entry(&staff.id, Amount::from_yuan(40))
            .await
            .expect("post");

        let report = state.reconcile().await.expect("reconcile");
        assert_eq!(report.diverged, 1);
        assert_eq!(
            state.staff().await[0].collected_amount,
            Amount::from_yuan(40)
        );
        assert_eq!(state.data().await.records.len(), 1);
    }

    #[test]
    fn store_errors_show_save_failed_message() {
        let err = DashboardError::Store(RepositoryError::DataCorruption("x".to_owned()));
        assert_eq!(err.user_message(), SAVE_FAILED_MESSAGE);
        let err = DashboardError::NotFound("department");
        assert_eq!(err.user_message(), "department not found");
    }
}
