//! Episode scoring against the gold action script.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::core::clock::Clock;
use crate::core::store::Store;
use crate::task::{Action, Task};

/// Outcome of scoring one episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardInfo {
    /// `1.0` when the store matches and every expected output was seen.
    pub reward: f64,
    pub expected_fingerprint: String,
    pub actual_fingerprint: String,
    /// `collection/key` paths where the final store differs from gold.
    pub store_diff: Vec<String>,
    /// Expected outputs that never appeared.
    pub missing_outputs: Vec<String>,
}

/// Apply `actions` to a copy of `fixture`, ignoring individual failures.
pub fn gold_store(catalog: &Catalog, fixture: &Store, clock: &Clock, actions: &[Action]) -> Store {
    let mut store = fixture.clone();
    for action in actions {
        // Failures leave the store untouched, so skipping them is exact.
        let _ = catalog.invoke(&action.name, &mut store, clock, &action.kwargs_value());
    }
    store
}

/// Expected outputs not contained in any of `observed`.
///
/// Matching is case-insensitive and ignores commas, so `"1,200"` matches
/// `"1200"`.
pub fn missing_outputs(outputs: &[String], observed: &[String]) -> Vec<String> {
    let observed: Vec<String> = observed.iter().map(|text| normalize(text)).collect();
    outputs
        .iter()
        .filter(|output| {
            let wanted = normalize(output);
            !observed.iter().any(|text| text.contains(&wanted))
        })
        .cloned()
        .collect()
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(',', "")
}

pub fn calculate(
    catalog: &Catalog,
    fixture: &Store,
    clock: &Clock,
    task: &Task,
    actual: &Store,
    observed: &[String],
) -> RewardInfo {
    let expected = gold_store(catalog, fixture, clock, &task.actions);
    let store_diff = expected.diff(actual);
    let missing_outputs = missing_outputs(&task.outputs, observed);
    let reward = if store_diff.is_empty() && missing_outputs.is_empty() {
        1.0
    } else {
        0.0
    };
    RewardInfo {
        reward,
        expected_fingerprint: expected.fingerprint(),
        actual_fingerprint: actual.fingerprint(),
        store_diff,
        missing_outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_match_without_case_or_commas() {
        let outputs = vec!["1,200.50".to_string(), "Cancelled".to_string(), "SO0999".to_string()];
        let observed = vec!["Your refund of 1200.50 is on its way; order CANCELLED.".to_string()];
        assert_eq!(missing_outputs(&outputs, &observed), vec!["SO0999".to_string()]);
    }
}
