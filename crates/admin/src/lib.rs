//! PropFee Admin library.
//!
//! Serves the fee-collection dashboard: departments, staff, fee entries,
//! derived statistics and AI suggestions, behind a password login.
//!
//! The binary in `main.rs` wires configuration, the `PostgreSQL` store and
//! the observability stack around [`app`]; tests drive [`app`] directly with
//! the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub mod config;
pub mod db;
pub mod error;
pub mod insight;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use state::AppState;

/// Build the application router with request tracing.
///
/// The caller adds the session layer (and, in the binary, Sentry).
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
