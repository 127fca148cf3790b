//! Result capture and persistence.
//!
//! Writes run metadata (`meta.json`) and the task reports with their check
//! outcomes (`tasks.json`) to the results directory for later analysis.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use registry::run::TaskReport;

use crate::judge::Judgment;
use crate::outcome::Outcome;

/// Input for capturing results from a completed run.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub case_id: &'a str,
    pub case_path: &'a Path,
    pub eval_run_id: &'a str,
    pub domain: &'a str,
    pub interface: u8,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Fingerprint of the pristine fixture, when the environment was built.
    pub fixture_fingerprint: Option<String>,
    pub reports: &'a [TaskReport],
    pub judgment: &'a Judgment,
    /// Why the run could not complete, if it did not.
    pub error: Option<String>,
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EvalMeta {
    pub case_id: String,
    pub eval_run_id: String,
    /// SHA-256 hash of the case file for reproducibility tracking.
    pub case_hash: String,
    pub domain: String,
    pub interface: u8,
    pub outcome: Option<Outcome>,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub fixture_fingerprint: Option<String>,
    /// Final store fingerprint per replayed task, in replay order.
    pub final_fingerprints: Vec<String>,
    pub tasks_run: usize,
    pub tasks_passed: usize,
    /// Non-fatal capture errors and the run error, if any.
    pub errors: Vec<String>,
}

/// Contents of `tasks.json`.
#[derive(Debug, Serialize)]
struct TasksFile<'a> {
    reports: &'a [TaskReport],
    #[serde(flatten)]
    judgment: &'a Judgment,
}

/// Capture results from a completed run to the results directory.
#[instrument(skip_all, fields(case_id = %input.case_id, eval_run_id = %input.eval_run_id))]
pub fn capture_results(base_dir: &Path, input: &CaptureInput<'_>) -> Result<PathBuf> {
    let results_dir = results_dir(base_dir, input.case_id, input.eval_run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let mut errors = Vec::new();
    let case_hash = match file_sha256(input.case_path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("case hash: {err}"));
            String::new()
        }
    };
    if let Some(error) = &input.error {
        errors.push(format!("run: {error}"));
    }
    if !errors.is_empty() {
        warn!(errors = ?errors, "run had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        case_id: input.case_id.to_string(),
        eval_run_id: input.eval_run_id.to_string(),
        case_hash,
        domain: input.domain.to_string(),
        interface: input.interface,
        outcome: None,
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        fixture_fingerprint: input.fixture_fingerprint.clone(),
        final_fingerprints: input
            .reports
            .iter()
            .map(|report| report.fingerprint.clone())
            .collect(),
        tasks_run: input.reports.len(),
        tasks_passed: input.reports.iter().filter(|report| report.passed).count(),
        errors,
    };
    write_meta(&results_dir.join("meta.json"), &meta)?;

    let tasks = TasksFile {
        reports: input.reports,
        judgment: input.judgment,
    };
    write_json(&results_dir.join("tasks.json"), &tasks)?;
    debug!(results_dir = %results_dir.display(), "results captured");
    Ok(results_dir)
}

pub fn update_outcome(results_dir: &Path, outcome: Outcome) -> Result<()> {
    let meta_path = results_dir.join("meta.json");
    let mut meta = read_meta(&meta_path)?;
    meta.outcome = Some(outcome);
    write_meta(&meta_path, &meta)?;
    Ok(())
}

pub fn read_meta(path: &Path) -> Result<EvalMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn results_dir(base_dir: &Path, case_id: &str, eval_run_id: &str) -> PathBuf {
    base_dir.join(case_id).join(eval_run_id)
}

fn write_meta(path: &Path, meta: &EvalMeta) -> Result<()> {
    write_json(path, meta)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    fs::write(path, format!("{contents}\n")).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}
