//! Dashboard entities and the inputs that create or edit them.
//!
//! Wire shape is camelCase; the store uses snake_case columns and the admin
//! crate's row types translate between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::amount::Amount;
use super::id::{DepartmentId, FeeRecordId, StaffId, UserId};
use super::role::UserRole;

/// Default chart color for new departments.
pub const DEFAULT_DEPARTMENT_COLOR: &str = "#6366f1";

/// Input validation failures for entity creation and edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A display name was empty or whitespace.
    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    /// Colors are `#rrggbb` hex strings.
    #[error("invalid color: {0}")]
    InvalidColor(String),
}

/// An organizational grouping of staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    /// Chart color; advisory only, not unique.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<Amount>,
}

impl Department {
    /// Apply a partial edit in place.
    pub fn apply(&mut self, patch: &DepartmentPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(color) = &patch.color {
            self.color.clone_from(color);
        }
        if let Some(target) = patch.target_amount {
            self.target_amount = target;
        }
    }
}

/// An individual fee collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    /// `None` once the owning department has been deleted.
    pub dept_id: Option<DepartmentId>,
    pub collected_amount: Amount,
    pub target: Amount,
}

impl Staff {
    /// Apply a partial edit in place.
    pub fn apply(&mut self, patch: &StaffPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(dept_id) = &patch.dept_id {
            self.dept_id.clone_from(dept_id);
        }
        if let Some(target) = patch.target {
            self.target = target;
        }
        if let Some(collected) = patch.collected_amount {
            self.collected_amount = collected;
        }
    }
}

/// One immutable, append-only collection event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEntryRecord {
    pub id: FeeRecordId,
    pub staff_id: StaffId,
    pub amount: Amount,
    /// Creation time, epoch milliseconds on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// A dashboard user profile (never carries the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
}

/// The three collections the dashboard works on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub departments: Vec<Department>,
    pub staff: Vec<Staff>,
    /// Newest first.
    pub records: Vec<FeeEntryRecord>,
}

impl DashboardData {
    /// Find a staff member by id.
    #[must_use]
    pub fn staff_member(&self, id: &StaffId) -> Option<&Staff> {
        self.staff.iter().find(|s| &s.id == id)
    }

    /// Find a department by id.
    #[must_use]
    pub fn department(&self, id: &DepartmentId) -> Option<&Department> {
        self.departments.iter().find(|d| &d.id == id)
    }
}

/// Input for registering a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub target_amount: Option<Amount>,
}

impl NewDepartment {
    /// Trim and validate the input.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty name or a malformed color.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: validate_name(&self.name, "department name")?,
            color: validate_color(&self.color)?,
            target_amount: self.target_amount,
        })
    }
}

/// Partial edit of a department.
///
/// An absent `targetAmount` leaves the target alone; an explicit `null`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_amount: Option<Option<Amount>>,
}

impl DepartmentPatch {
    /// Trim and validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty name or a malformed color.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: self
                .name
                .map(|n| validate_name(&n, "department name"))
                .transpose()?,
            color: self.color.map(|c| validate_color(&c)).transpose()?,
            target_amount: self.target_amount,
        })
    }
}

/// Input for registering a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaff {
    pub name: String,
    pub dept_id: DepartmentId,
    pub target: Amount,
}

impl NewStaff {
    /// Trim and validate the input.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` for an empty name.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: validate_name(&self.name, "staff name")?,
            dept_id: self.dept_id,
            target: self.target,
        })
    }
}

/// Partial edit of a staff member.
///
/// `collected_amount` is the direct-edit path for correcting a running total.
/// `deptId: null` unassigns the staff member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub dept_id: Option<Option<DepartmentId>>,
    #[serde(default)]
    pub target: Option<Amount>,
    #[serde(default)]
    pub collected_amount: Option<Amount>,
}

impl StaffPatch {
    /// Trim and validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` for an empty name.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: self
                .name
                .map(|n| validate_name(&n, "staff name"))
                .transpose()?,
            ..self
        })
    }
}

/// Wraps any present value, `null` included, so a missing field stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_color() -> String {
    DEFAULT_DEPARTMENT_COLOR.to_owned()
}

fn validate_name(name: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName(field));
    }
    Ok(trimmed.to_owned())
}

fn validate_color(color: &str) -> Result<String, ValidationError> {
    let trimmed = color.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed.chars().skip(1).all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidColor(color.to_owned()));
    }
    Ok(trimmed.to_ascii_lowercase())
}
