//! PropFee Core - Shared domain types and aggregation rules.
//!
//! This crate provides the types used across all PropFee components:
//! - `admin` - Dashboard API server (store access, insight client, sessions)
//! - `cli` - Command-line tools for migrations, users and demo data
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Every statistic shown on the dashboard is derived
//! here from the three entity collections.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, amounts, roles and the dashboard entities
//! - [`stats`] - Totals, completion rate, top performer, rollups and chart series

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod stats;
pub mod types;

pub use stats::*;
pub use types::*;
