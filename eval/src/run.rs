//! Case execution orchestration.
//!
//! Builds the environment, replays the case's tasks, judges the reports and
//! captures results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use registry::env::Environment;
use registry::io::config::EnvConfig;
use registry::run::{TaskReport, TaskRunner};

use crate::case::{CaseFile, Check};
use crate::config::apply_case_config;
use crate::judge::run_checks;
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{CaptureInput, capture_results, update_outcome};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Classified outcome.
    pub outcome: Outcome,
}

/// What one replay of a case produced.
struct Replay {
    fixture_fingerprint: String,
    reports: Vec<TaskReport>,
    second: Option<Vec<TaskReport>>,
}

/// Run a case end-to-end: environment, replay, checks, result capture.
#[instrument(skip_all, fields(case_id = %case.case.id))]
pub fn run_case(repo_root: &Path, case_path: &Path, case: &CaseFile) -> Result<RunOutcome> {
    info!("case run started");
    let config = apply_case_config(EnvConfig::default(), case, repo_root)?;

    let started_at = Utc::now();
    let eval_run_id = format!("eval-{}", started_at.format("%Y%m%d_%H%M%S_%3f"));
    let replay = replay_case(&config, case);
    let finished_at = Utc::now();

    let (fixture_fingerprint, reports, judgment, error) = match replay {
        Ok(replay) => {
            let judgment = run_checks(&case.checks, &replay.reports, replay.second.as_deref());
            (Some(replay.fixture_fingerprint), replay.reports, Some(judgment), None)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "replay failed");
            (None, Vec::new(), None, Some(format!("{err:#}")))
        }
    };
    let outcome = classify_outcome(judgment.as_ref());
    let judgment = judgment.unwrap_or_default();

    debug!("capturing results");
    let capture_input = CaptureInput {
        case_id: &case.case.id,
        case_path,
        eval_run_id: &eval_run_id,
        domain: config.domain.as_str(),
        interface: config.interface.number(),
        started_at,
        finished_at,
        fixture_fingerprint,
        reports: &reports,
        judgment: &judgment,
        error,
    };
    let results_dir = capture_results(&repo_root.join("eval").join("results"), &capture_input)
        .context("capture results")?;
    update_outcome(&results_dir, outcome).context("update outcome")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");
    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        outcome,
    })
}

fn replay_case(config: &EnvConfig, case: &CaseFile) -> Result<Replay> {
    let mut env = Environment::load(config).context("build environment")?;
    let indices = task_indices(case, env.tasks().len())?;
    let reports = replay_tasks(&mut env, &indices)?;
    let second = if case.wants(Check::Deterministic) {
        Some(replay_tasks(&mut env, &indices)?)
    } else {
        None
    };
    Ok(Replay {
        fixture_fingerprint: env.fixture().fingerprint(),
        reports,
        second,
    })
}

fn replay_tasks(env: &mut Environment, indices: &[usize]) -> Result<Vec<TaskReport>> {
    let mut runner = TaskRunner::new(env);
    indices
        .iter()
        .map(|&index| {
            runner
                .replay(index)
                .with_context(|| format!("replay task {index}"))
        })
        .collect()
}

fn task_indices(case: &CaseFile, available: usize) -> Result<Vec<usize>> {
    let Some(selected) = &case.config.tasks else {
        return Ok((0..available).collect());
    };
    if let Some(out_of_range) = selected.iter().find(|&&index| index >= available) {
        bail!("config.tasks: index {out_of_range} out of range ({available} tasks)");
    }
    Ok(selected.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseConfig, CaseMeta};
    use crate::results::read_meta;
    use registry::domains::Domain;
    use registry::test_support::{action, fixture, task, write_domain};
    use serde_json::json;
    use std::fs;

    fn case(id: &str, domain: Domain, tasks: Option<Vec<usize>>, checks: Vec<Check>) -> CaseFile {
        CaseFile {
            case: CaseMeta {
                id: id.to_string(),
                domain,
                description: "test case".to_string(),
            },
            config: CaseConfig {
                tasks,
                ..CaseConfig::default()
            },
            checks,
        }
    }

    #[test]
    fn replays_and_records_a_passing_case() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = temp.path();
        let tasks = vec![task(
            vec![action(
                "update_device_state",
                json!({ "device_id": "1", "power": "on" }),
            )],
            &[],
        )];
        write_domain(&repo.join("data"), Domain::SmartHome, &fixture(Domain::SmartHome), &tasks)
            .expect("domain");
        let case_path = repo.join("case.toml");
        fs::write(&case_path, "# case\n").expect("case file");

        let case = case(
            "lights",
            Domain::SmartHome,
            None,
            vec![Check::AllCallsSucceed, Check::Deterministic, Check::NoDivergence],
        );
        let outcome = run_case(repo, &case_path, &case).expect("run");
        assert_eq!(outcome.outcome, Outcome::Pass);

        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert_eq!(meta.tasks_run, 1);
        assert_eq!(meta.tasks_passed, 1);
        assert_eq!(meta.outcome, Some(Outcome::Pass));
        assert!(meta.fixture_fingerprint.is_some());
        assert!(outcome.results_dir.join("tasks.json").exists());
    }

    #[test]
    fn failing_calls_fail_the_case() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = temp.path();
        let tasks = vec![task(
            vec![action("get_device", json!({ "device_id": "99" }))],
            &[],
        )];
        write_domain(&repo.join("data"), Domain::SmartHome, &fixture(Domain::SmartHome), &tasks)
            .expect("domain");
        let case_path = repo.join("case.toml");
        fs::write(&case_path, "# case\n").expect("case file");

        let case = case("missing", Domain::SmartHome, None, vec![Check::AllCallsSucceed]);
        let outcome = run_case(repo, &case_path, &case).expect("run");
        assert_eq!(outcome.outcome, Outcome::Fail);
    }

    #[test]
    fn missing_data_is_an_error_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let case_path = temp.path().join("case.toml");
        fs::write(&case_path, "# case\n").expect("case file");

        let case = case("absent", Domain::Airline, Some(vec![0]), vec![Check::NoDivergence]);
        let outcome = run_case(temp.path(), &case_path, &case).expect("run");
        assert_eq!(outcome.outcome, Outcome::Error);
        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert!(meta.errors.iter().any(|error| error.starts_with("run: build environment")));
    }

    #[test]
    fn task_subset_must_be_in_range() {
        let case = case("subset", Domain::Airline, Some(vec![0, 3]), vec![Check::NoDivergence]);
        let err = task_indices(&case, 2).expect_err("out of range");
        assert!(err.to_string().contains("index 3 out of range"));
        assert_eq!(task_indices(&case, 4).expect("in range"), vec![0, 3]);
    }
}
