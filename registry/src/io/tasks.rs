//! Task list loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::task::Task;

/// Load and validate a JSON array of tasks.
///
/// A malformed entry fails the whole file, naming its position.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let entries: Vec<Value> =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let mut tasks = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let task: Task = serde_json::from_value(entry)
            .with_context(|| format!("{}: task {position}", path.display()))?;
        task.validate()
            .with_context(|| format!("{}: task {position}", path.display()))?;
        tasks.push(task);
    }
    debug!(path = %path.display(), tasks = tasks.len(), "tasks loaded");
    Ok(tasks)
}
