//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::FeeStore;
use crate::insight::InsightProvider;
use crate::services::{AuthService, DashboardState};

/// Application state shared across all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn FeeStore>,
    dashboard: DashboardState,
    auth: AuthService,
}

impl AppState {
    /// Build the state from a store and an insight provider.
    #[must_use]
    pub fn new(store: Arc<dyn FeeStore>, insight: Arc<dyn InsightProvider>) -> Self {
        let dashboard = DashboardState::new(store.clone(), insight);
        let auth = AuthService::new(store.clone());
        Self::from_parts(store, dashboard, auth)
    }

    /// Build the state from already-constructed services.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn FeeStore>,
        dashboard: DashboardState,
        auth: AuthService,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                dashboard,
                auth,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn FeeStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn dashboard(&self) -> &DashboardState {
        &self.inner.dashboard
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }
}
