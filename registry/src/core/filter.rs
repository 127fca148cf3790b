//! Linear-scan filtering for search/list tools.

use serde_json::Value;

use crate::core::store::{Collection, Record, scalar_text};

/// AND-combined filters.
#[derive(Debug, Default)]
pub struct Filters<'a> {
    /// `field == value` (numbers and numeric strings compare by value).
    pub equals: Vec<(&'a str, &'a Value)>,
    /// Case-insensitive substring over any of the listed fields.
    pub contains: Vec<(&'a [&'a str], &'a str)>,
}

impl<'a> Filters<'a> {
    pub fn equal(mut self, field: &'a str, value: &'a Value) -> Self {
        self.equals.push((field, value));
        self
    }

    pub fn containing(mut self, fields: &'a [&'a str], needle: &'a str) -> Self {
        self.contains.push((fields, needle));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        let equal = self.equals.iter().all(|(field, wanted)| {
            record
                .get(*field)
                .is_some_and(|actual| loosely_equal(actual, wanted))
        });
        equal
            && self.contains.iter().all(|(fields, needle)| {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    record
                        .get(*field)
                        .and_then(Value::as_str)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            })
    }
}

/// Records of `collection` matching every filter, in natural key order.
pub fn filter_and_match<'c>(collection: Option<&'c Collection>, filters: &Filters<'_>) -> Vec<&'c Record> {
    let Some(collection) = collection else {
        return Vec::new();
    };
    collection
        .ordered()
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| filters.matches(record))
        .collect()
}

/// Equality that tolerates `1` vs `"1"` but is otherwise exact.
pub fn loosely_equal(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(_), Value::Number(_)) | (Value::Number(_), Value::String(_)) => {
            scalar_text(actual) == scalar_text(wanted)
        }
        _ => actual == wanted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::from_value;
    use serde_json::json;

    fn incidents() -> Collection {
        [
            ("1", json!({ "title": "VPN outage", "priority": "high", "category_id": "2" })),
            ("2", json!({ "title": "Printer jam", "priority": "low", "category_id": "3" })),
            ("10", json!({ "title": "vpn slow", "priority": "high", "category_id": 2 })),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), from_value(value)))
        .collect()
    }

    #[test]
    fn equality_filters_are_and_combined() {
        let collection = incidents();
        let high = json!("high");
        let category = json!("2");
        let filters = Filters::default()
            .equal("priority", &high)
            .equal("category_id", &category);
        let found = filter_and_match(Some(&collection), &filters);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn contains_is_case_insensitive_partial() {
        let collection = incidents();
        let fields: &[&str] = &["title"];
        let filters = Filters::default().containing(fields, "VPN");
        let titles: Vec<&str> = filter_and_match(Some(&collection), &filters)
            .into_iter()
            .filter_map(|record| record.get("title").and_then(Value::as_str))
            .collect();
        assert_eq!(titles, vec!["VPN outage", "vpn slow"]);
    }

    #[test]
    fn empty_filters_return_everything_in_key_order() {
        let collection = incidents();
        let found = filter_and_match(Some(&collection), &Filters::default());
        assert_eq!(found.len(), 3);
        assert!(filter_and_match(None, &Filters::default()).is_empty());
    }
}
