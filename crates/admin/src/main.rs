//! PropFee Admin - Property fee collection dashboard server.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API
//! - `PostgreSQL` for departments, staff, fee records, users and sessions
//! - OpenAI-compatible chat completions endpoint for suggestions
//! - Periodic reconcile pass against the store
//!
//! Migrations are NOT run on startup. Run them via `propfee-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propfee_admin::config::DashboardConfig;
use propfee_admin::db::{self, FeeStore, PgFeeStore};
use propfee_admin::insight::{InsightClient, InsightProvider};
use propfee_admin::middleware::create_session_layer;
use propfee_admin::services::DashboardState;
use propfee_admin::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &DashboardConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "propfee_admin=info,tower_http=debug".into());

    // JSON for log shippers, text locally
    let is_json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Run the reconcile pass on a fixed interval.
async fn reconcile_loop(dashboard: DashboardState, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; initialize() already loaded.
    interval.tick().await;

    loop {
        interval.tick().await;
        if let Err(e) = dashboard.reconcile().await {
            tracing::warn!(error = %e, "Scheduled reconcile failed, keeping local state");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = DashboardConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    let pool = db::create_pool(&config.database_url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create database pool");
        e
    })?;
    tracing::info!("Database pool created");

    let session_layer = create_session_layer(&pool, &config)?;

    let store: Arc<dyn FeeStore> = Arc::new(PgFeeStore::new(pool));
    let insight_client = InsightClient::new(&config.insight)?;
    let insight: Arc<dyn InsightProvider> = Arc::new(insight_client);

    let state = AppState::new(store, insight);

    // Initial load and first insight run in the background
    let dashboard = state.dashboard().clone();
    tokio::spawn(async move {
        if let Err(e) = dashboard.initialize().await {
            tracing::error!(error = %e, "Initial dashboard load failed");
        }
    });

    if let Some(period) = config.reconcile_interval {
        tokio::spawn(reconcile_loop(state.dashboard().clone(), period));
        tracing::info!(period_secs = period.as_secs(), "Reconcile task started");
    }

    let app = propfee_admin::app(state)
        .layer(session_layer)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
