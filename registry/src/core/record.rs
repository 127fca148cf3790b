//! Small accessors over JSON records.

use serde_json::{Map, Value};

use crate::core::store::Record;

/// Text value of `field`, if it is a string.
pub fn text<'r>(record: &'r Record, field: &str) -> Option<&'r str> {
    record.get(field).and_then(Value::as_str)
}

/// Numeric value at a dotted path (`balances.available`).
pub fn number(record: &Record, path: &str) -> Option<f64> {
    lookup(record, path).and_then(Value::as_f64)
}

/// Value at a dotted path.
pub fn lookup<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// The record's `status` text (empty when absent).
pub fn status(record: &Record) -> &str {
    text(record, "status").unwrap_or("")
}

pub fn set(record: &mut Record, field: &str, value: impl Into<Value>) {
    record.insert(field.to_string(), value.into());
}

/// Round to cents. Amounts are plain floats; this keeps outputs stable.
pub fn money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build a record from a JSON object value (non-objects yield an empty record).
pub fn from_value(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_lookup() {
        let record = from_value(json!({ "balances": { "available": 12.5 }, "status": "open" }));
        assert_eq!(number(&record, "balances.available"), Some(12.5));
        assert_eq!(number(&record, "balances.book"), None);
        assert_eq!(status(&record), "open");
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(money(10.0 / 3.0), 3.33);
        assert_eq!(money(19.999), 20.0);
    }
}
