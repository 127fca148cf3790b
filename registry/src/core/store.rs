//! In-memory data store: collection name -> string id -> record.
//!
//! The store is the only owner of entity records. Tools borrow it mutably for
//! the duration of one call; environments keep a pristine fixture copy and
//! clone it on reset.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::ids::compare_keys;

/// A single entity: an unordered attribute map.
pub type Record = Map<String, Value>;

/// Records of one collection keyed by their string id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    records: BTreeMap<String, Record>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, record: Record) -> Option<Record> {
        self.records.insert(id.into(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<Record> {
        self.records.remove(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Records in natural key order (`"2"` before `"10"`, `SO0009` before `SO0010`).
    pub fn ordered(&self) -> Vec<(&str, &Record)> {
        let mut entries: Vec<(&str, &Record)> = self
            .records
            .iter()
            .map(|(key, record)| (key.as_str(), record))
            .collect();
        entries.sort_by(|left, right| compare_keys(left.0, right.0));
        entries
    }
}

impl FromIterator<(String, Record)> for Collection {
    fn from_iter<T: IntoIterator<Item = (String, Record)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// The per-task world state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    collections: BTreeMap<String, Collection>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Mutable access, creating the collection when absent.
    pub fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }

    pub fn insert_collection(&mut self, name: impl Into<String>, collection: Collection) {
        self.collections.insert(name.into(), collection);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Record> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    pub fn get_mut(&mut self, collection: &str, id: &str) -> Option<&mut Record> {
        self.collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
    }

    pub fn insert(&mut self, collection: &str, id: impl Into<String>, record: Record) {
        self.collection_mut(collection).insert(id, record);
    }

    pub fn remove(&mut self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .get_mut(collection)
            .and_then(|c| c.remove(id))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn record_count(&self) -> usize {
        self.collections.values().map(Collection::len).sum()
    }

    /// Canonical JSON: object keys sorted at every depth.
    pub fn canonical_json(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        canonicalize(&value).to_string()
    }

    /// SHA-256 (hex) of the canonical JSON serialization.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Record-level differences as `collection/key` paths, sorted.
    ///
    /// A whole collection present on only one side is reported as `collection`.
    pub fn diff(&self, other: &Store) -> Vec<String> {
        let names: BTreeSet<&str> = self.names().chain(other.names()).collect();
        let mut paths = Vec::new();
        for name in names {
            match (self.collection(name), other.collection(name)) {
                (Some(left), Some(right)) => {
                    let mut keys: Vec<&str> = left.keys().chain(right.keys()).collect();
                    keys.sort_by(|a, b| compare_keys(a, b));
                    keys.dedup();
                    for key in keys {
                        if left.get(key) != right.get(key) {
                            paths.push(format!("{name}/{key}"));
                        }
                    }
                }
                (Some(only), None) | (None, Some(only)) if !only.is_empty() => {
                    paths.push(name.to_string());
                }
                _ => {}
            }
        }
        paths
    }
}

/// Rebuild `value` with object keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compare two JSON scalars for sorting: numbers numerically, everything else
/// by string form; nulls last.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(a), Some(b)) => scalar_text(a).cmp(&scalar_text(b)),
    }
}

/// String form of a scalar (strings unquoted).
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn ordered_uses_natural_key_order() {
        let mut store = Store::new();
        for key in ["10", "2", "1"] {
            store.insert("users", key, record(json!({ "id": key })));
        }
        let keys: Vec<&str> = store
            .collection("users")
            .expect("users")
            .ordered()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["1", "2", "10"]);
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let mut left = Store::new();
        left.insert("a", "1", record(json!({ "x": 1, "y": 2 })));
        left.insert("b", "1", record(json!({ "z": 3 })));
        let mut right = Store::new();
        right.insert("b", "1", record(json!({ "z": 3 })));
        right.insert("a", "1", record(json!({ "y": 2, "x": 1 })));
        assert_eq!(left.fingerprint(), right.fingerprint());
        assert_eq!(left.fingerprint().len(), 64);
    }

    #[test]
    fn diff_reports_changed_and_missing_records() {
        let mut left = Store::new();
        left.insert("users", "1", record(json!({ "name": "a" })));
        left.insert("users", "2", record(json!({ "name": "b" })));
        let mut right = left.clone();
        if let Some(user) = right.get_mut("users", "1") {
            user.insert("name".to_string(), json!("changed"));
        }
        right.remove("users", "2");
        right.insert("pages", "1", record(json!({ "title": "t" })));
        assert_eq!(left.diff(&right), vec!["pages", "users/1", "users/2"]);
        assert!(left.diff(&left.clone()).is_empty());
    }

    #[test]
    fn deserializes_fixture_shape() {
        let store: Store = serde_json::from_value(json!({
            "users": { "1": { "id": 1, "name": "Ada" } }
        }))
        .expect("store");
        assert_eq!(store.record_count(), 1);
        assert_eq!(
            store.get("users", "1").and_then(|u| u.get("name")),
            Some(&json!("Ada"))
        );
    }
}
