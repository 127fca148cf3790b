//! Identifier allocation and the key/identity-field duality.
//!
//! Allocation is derived from collection state only: the next id is one past
//! the largest numeric suffix among keys that match the scheme. Keys that do
//! not match are ignored.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::core::clock::Clock;
use crate::core::store::{Collection, Record};

/// Per-collection id format. Part of the external contract with fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// `"1"`, `"2"`, ...; the identity field stores the integer form.
    Sequential,
    /// `ACC12`, `SO0455` (width 4), `RES00001` (width 5), `INC_5005`, `LN-3`.
    Prefixed { prefix: &'static str, width: usize },
    /// `TXN-YYYYMMDD-<n>`; the date comes from the environment clock and `n`
    /// restarts per date.
    Dated { prefix: &'static str },
}

impl IdScheme {
    /// Next key for `collection` (absent collections allocate the first id).
    pub fn allocate(&self, collection: Option<&Collection>, clock: &Clock) -> String {
        let keys = || collection.into_iter().flat_map(Collection::keys);
        match *self {
            IdScheme::Sequential => (max_suffix(keys(), "") + 1).to_string(),
            IdScheme::Prefixed { prefix, width } => {
                let next = max_suffix(keys(), prefix) + 1;
                format!("{prefix}{next:0>width$}")
            }
            IdScheme::Dated { prefix } => {
                let dated = format!("{prefix}{}-", clock.compact_date());
                let next = max_suffix(keys(), &dated) + 1;
                format!("{dated}{next}")
            }
        }
    }

    /// Value written to the identity field for `key`.
    pub fn identity_value(&self, key: &str) -> Value {
        match self {
            IdScheme::Sequential => key
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(key.to_string())),
            IdScheme::Prefixed { .. } | IdScheme::Dated { .. } => Value::String(key.to_string()),
        }
    }
}

/// Write the identity field so it always agrees with the storage key.
pub fn stamp_identity(record: &mut Record, id_field: &str, scheme: IdScheme, key: &str) {
    record.insert(id_field.to_string(), scheme.identity_value(key));
}

/// Natural ordering of keys: textual prefix, then numeric suffix, then raw text.
pub fn compare_keys(left: &str, right: &str) -> Ordering {
    let (left_prefix, left_number) = split_numeric_suffix(left);
    let (right_prefix, right_number) = split_numeric_suffix(right);
    left_prefix
        .cmp(right_prefix)
        .then_with(|| left_number.cmp(&right_number))
        .then_with(|| left.cmp(right))
}

fn split_numeric_suffix(key: &str) -> (&str, Option<u128>) {
    let prefix_len = key.trim_end_matches(|ch: char| ch.is_ascii_digit()).len();
    let (prefix, digits) = key.split_at(prefix_len);
    (prefix, digits.parse::<u128>().ok())
}

fn max_suffix<'a>(keys: impl Iterator<Item = &'a str>, prefix: &str) -> u64 {
    let Ok(pattern) = Regex::new(&format!(r"^{}(\d+)$", regex::escape(prefix))) else {
        return 0;
    };
    keys.filter_map(|key| pattern.captures(key))
        .filter_map(|captures| captures.get(1))
        .filter_map(|digits| digits.as_str().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(keys: &[&str]) -> Collection {
        keys.iter()
            .map(|key| (key.to_string(), Record::new()))
            .collect()
    }

    fn clock() -> Clock {
        Clock::fixed("2025-10-01T00:00:00").expect("clock")
    }

    #[test]
    fn empty_collection_allocates_one() {
        assert_eq!(IdScheme::Sequential.allocate(None, &clock()), "1");
        assert_eq!(
            IdScheme::Sequential.allocate(Some(&Collection::default()), &clock()),
            "1"
        );
    }

    #[test]
    fn sequential_is_max_plus_one_ignoring_foreign_keys() {
        let users = collection(&["1", "7", "3", "U", "alice"]);
        assert_eq!(IdScheme::Sequential.allocate(Some(&users), &clock()), "8");
    }

    #[test]
    fn prefixed_keeps_padding() {
        let orders = collection(&["SO0455", "SO0009"]);
        let scheme = IdScheme::Prefixed {
            prefix: "SO",
            width: 4,
        };
        assert_eq!(scheme.allocate(Some(&orders), &clock()), "SO0456");

        let reservations = IdScheme::Prefixed {
            prefix: "RES",
            width: 5,
        };
        assert_eq!(reservations.allocate(None, &clock()), "RES00001");

        let incidents = collection(&["INC_5005", "INC_17"]);
        let scheme = IdScheme::Prefixed {
            prefix: "INC_",
            width: 0,
        };
        assert_eq!(scheme.allocate(Some(&incidents), &clock()), "INC_5006");
    }

    #[test]
    fn dated_restarts_per_day() {
        let txns = collection(&["TXN-20250930-4", "TXN-20251001-2"]);
        let scheme = IdScheme::Dated { prefix: "TXN-" };
        assert_eq!(scheme.allocate(Some(&txns), &clock()), "TXN-20251001-3");
        let other_day = collection(&["TXN-20250930-4"]);
        assert_eq!(
            scheme.allocate(Some(&other_day), &clock()),
            "TXN-20251001-1"
        );
    }

    #[test]
    fn identity_value_matches_key() {
        assert_eq!(IdScheme::Sequential.identity_value("5"), Value::from(5));
        let scheme = IdScheme::Prefixed {
            prefix: "ACC",
            width: 0,
        };
        assert_eq!(scheme.identity_value("ACC5"), Value::from("ACC5"));

        let mut record = Record::new();
        stamp_identity(&mut record, "id", IdScheme::Sequential, "12");
        assert_eq!(record.get("id"), Some(&Value::from(12)));
    }

    #[test]
    fn natural_order() {
        let mut keys = vec!["10", "9", "SO0010", "SO0009", "a"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["9", "10", "SO0009", "SO0010", "a"]);
    }
}
