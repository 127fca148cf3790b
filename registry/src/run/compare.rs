//! Call comparison with argument normalization.

use serde_json::{Map, Value};

use crate::task::Action;

/// Normalize kwargs for comparison: nulls dropped, numbers as `f64`,
/// strings trimmed, recursively.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Number(number) => number
            .as_f64()
            .map_or_else(|| value.clone(), Value::from),
        Value::String(text) => Value::String(text.trim().to_string()),
        Value::Null | Value::Bool(_) => value.clone(),
    }
}

/// Same tool name and equal normalized kwargs.
pub fn same_call(expected: &Action, actual: &Action) -> bool {
    expected.name == actual.name
        && normalize(&expected.kwargs_value()) == normalize(&actual.kwargs_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ignores_nulls_whitespace_and_number_form() {
        let expected = Action::new("record_transaction", json!({ "account_id": "ACC1", "amount": 25 }));
        let actual = Action::new(
            "record_transaction",
            json!({ "account_id": " ACC1 ", "amount": 25.0, "description": null }),
        );
        assert!(same_call(&expected, &actual));
    }

    #[test]
    fn different_names_or_values_differ() {
        let expected = Action::new("get_user", json!({ "user_id": "U1" }));
        assert!(!same_call(&expected, &Action::new("get_account", json!({ "user_id": "U1" }))));
        assert!(!same_call(&expected, &Action::new("get_user", json!({ "user_id": "U2" }))));
    }
}
