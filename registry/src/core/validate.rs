//! Validation kernel shared by every tool.
//!
//! Each primitive either succeeds or returns one [`ToolError`]. Tools call
//! them before touching the store so that a failing call never mutates.

use chrono::NaiveDate;
use serde_json::Value;

use crate::core::clock::parse_date;
use crate::core::error::{ToolError, ToolResult};
use crate::core::store::{Record, Store, scalar_text};

/// Fetch `collection[id]` or fail with `"<label> <id> not found"`.
pub fn require_exists<'s>(
    store: &'s Store,
    collection: &str,
    label: &str,
    id: &str,
) -> ToolResult<&'s Record> {
    store
        .get(collection, id)
        .ok_or_else(|| ToolError::not_found(label, id))
}

/// Membership check against a fixed vocabulary.
pub fn require_enum(value: &str, allowed: &[&str], field: &str) -> ToolResult<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(ToolError::invalid_enum(field, allowed))
}

/// Fail when another record of `collection` already carries `value` in `field`.
///
/// `exclude` skips the record being updated. String comparison is
/// case-insensitive so `A@x.com` and `a@x.com` collide.
pub fn require_unique(
    store: &Store,
    collection: &str,
    field: &str,
    value: &Value,
    exclude: Option<&str>,
) -> ToolResult<()> {
    let Some(records) = store.collection(collection) else {
        return Ok(());
    };
    let wanted = normalize_unique(value);
    for (key, record) in records.ordered() {
        if Some(key) == exclude {
            continue;
        }
        if record.get(field).map(normalize_unique).as_deref() == Some(wanted.as_str()) {
            return Err(ToolError::duplicate(format!(
                "{field} '{}' already exists",
                scalar_text(value)
            )));
        }
    }
    Ok(())
}

fn normalize_unique(value: &Value) -> String {
    scalar_text(value).trim().to_lowercase()
}

/// Every named flag must be `true`; the first missing one is reported.
pub fn require_approvals(flags: &[(&str, Option<bool>)]) -> ToolResult<()> {
    for (name, value) in flags {
        if *value != Some(true) {
            return Err(ToolError::approval_required(name));
        }
    }
    Ok(())
}

pub fn require_positive(field: &str, value: f64) -> ToolResult<()> {
    if value > 0.0 && value.is_finite() {
        return Ok(());
    }
    Err(ToolError::invalid_argument(format!("{field} must be positive")))
}

pub fn require_non_negative(field: &str, value: f64) -> ToolResult<()> {
    if value >= 0.0 && value.is_finite() {
        return Ok(());
    }
    Err(ToolError::invalid_argument(format!(
        "{field} must not be negative"
    )))
}

/// Parse a `YYYY-MM-DD` date argument.
pub fn require_date(field: &str, text: &str) -> ToolResult<NaiveDate> {
    parse_date(text).ok_or_else(|| {
        ToolError::invalid_argument(format!("Invalid {field} '{text}': expected YYYY-MM-DD"))
    })
}

/// `end` must fall strictly after `start`.
pub fn require_date_order(
    start_field: &str,
    start: &str,
    end_field: &str,
    end: &str,
) -> ToolResult<()> {
    let start_date = require_date(start_field, start)?;
    let end_date = require_date(end_field, end)?;
    if end_date > start_date {
        return Ok(());
    }
    Err(ToolError::invalid_argument(format!(
        "{end_field} must be after {start_field}"
    )))
}

/// Non-empty text after trimming.
pub fn require_text(field: &str, text: &str) -> ToolResult<()> {
    if text.trim().is_empty() {
        return Err(ToolError::invalid_argument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}
