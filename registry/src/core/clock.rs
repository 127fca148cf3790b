//! Deterministic clock injected by the environment.
//!
//! Tools never read the wall clock. Every timestamp they write is the single
//! configured ISO-8601 literal, and every date they derive comes from it.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

use crate::core::error::{ToolError, ToolResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    literal: String,
    date: NaiveDate,
}

impl Clock {
    /// Accepts `2025-10-01T00:00:00`, `2025-08-07T00:00:00Z` and other RFC 3339 forms.
    pub fn fixed(literal: &str) -> ToolResult<Self> {
        let date = parse_timestamp(literal).ok_or_else(|| {
            ToolError::invalid_argument(format!("Invalid timestamp '{literal}': expected ISO-8601"))
        })?;
        Ok(Self {
            literal: literal.to_string(),
            date,
        })
    }

    /// The configured timestamp, byte-for-byte.
    pub fn now(&self) -> &str {
        &self.literal
    }

    /// `YYYY-MM-DD`.
    pub fn today(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `YYYYMMDD`, used by dated id schemes.
    pub fn compact_date(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `YYYY-MM-DD` of today plus `days`.
    pub fn date_after_days(&self, days: u64) -> String {
        self.date
            .checked_add_days(Days::new(days))
            .unwrap_or(self.date)
            .format("%Y-%m-%d")
            .to_string()
    }
}

fn parse_timestamp(literal: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(literal) {
        return Some(parsed.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(literal, format).ok())
        .map(|parsed| parsed.date())
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
