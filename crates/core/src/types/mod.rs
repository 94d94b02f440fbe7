//! Core types for PropFee.
//!
//! This module provides type-safe wrappers for the dashboard's domain concepts.

pub mod amount;
pub mod entity;
pub mod id;
pub mod role;

pub use amount::{Amount, AmountError};
pub use entity::*;
pub use id::*;
pub use role::UserRole;
