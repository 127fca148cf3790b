//! Fixture loading: one JSON file per collection.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::debug;

use crate::core::store::{Collection, Store};

/// Load every `*.json` file in `dir` as a collection named after its stem.
///
/// Each file must hold an object mapping string ids to record objects.
pub fn load_store(dir: &Path) -> Result<Store> {
    let entries = fs::read_dir(dir).with_context(|| format!("read fixture dir {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read fixture dir {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut store = Store::new();
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("fixture file name {}", path.display()))?
            .to_string();
        let collection = load_collection(&path)?;
        debug!(collection = %name, records = collection.len(), "fixture loaded");
        store.insert_collection(name, collection);
    }
    Ok(store)
}

fn load_collection(path: &Path) -> Result<Collection> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let Value::Object(entries) = value else {
        return Err(anyhow!(
            "{}: top-level value must be an object keyed by id",
            path.display()
        ));
    };
    entries
        .into_iter()
        .map(|(key, record)| match record {
            Value::Object(record) => Ok((key, record)),
            _ => Err(anyhow!("{}: record {key} is not an object", path.display())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_collections_by_file_stem() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("users.json"),
            r#"{"1": {"id": 1, "name": "Ada"}, "2": {"id": 2, "name": "Lin"}}"#,
        )
        .expect("write users");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("write notes");

        let store = load_store(temp.path()).expect("load");
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["users"]);
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.get("users", "2").expect("user")["name"], "Lin");
    }

    #[test]
    fn rejects_non_object_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("users.json"), r#"{"1": [1, 2]}"#).expect("write");
        let err = load_store(temp.path()).expect_err("array record");
        assert!(err.to_string().contains("record 1 is not an object"));
    }
}
