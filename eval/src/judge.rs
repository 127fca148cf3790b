//! Check execution and outcome recording.
//!
//! Judges the task reports of a replay against the case's checks.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use registry::run::{Divergence, TaskReport};

use crate::case::Check;

/// Collected check outcomes for a run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of running a single check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    AllCallsSucceed {
        passed: bool,
        failed_calls: usize,
    },
    OutputsObserved {
        passed: bool,
        missing: Vec<String>,
    },
    Deterministic {
        passed: bool,
        /// Tasks whose second replay ended on a different fingerprint.
        unstable_tasks: Vec<usize>,
    },
    NoDivergence {
        passed: bool,
        divergences: usize,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::AllCallsSucceed { passed, .. }
            | CheckOutcome::OutputsObserved { passed, .. }
            | CheckOutcome::Deterministic { passed, .. }
            | CheckOutcome::NoDivergence { passed, .. } => *passed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckOutcome::AllCallsSucceed { .. } => Check::AllCallsSucceed.label(),
            CheckOutcome::OutputsObserved { .. } => Check::OutputsObserved.label(),
            CheckOutcome::Deterministic { .. } => Check::Deterministic.label(),
            CheckOutcome::NoDivergence { .. } => Check::NoDivergence.label(),
        }
    }
}

/// Run all checks over `reports`.
///
/// `second` holds the reports of a repeated replay; without it the
/// determinism check fails.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn run_checks(checks: &[Check], reports: &[TaskReport], second: Option<&[TaskReport]>) -> Judgment {
    let mut outcomes = Vec::with_capacity(checks.len());
    for check in checks {
        let outcome = match check {
            Check::AllCallsSucceed => {
                let failed_calls = reports.iter().map(TaskReport::failed_calls).sum();
                CheckOutcome::AllCallsSucceed {
                    passed: failed_calls == 0,
                    failed_calls,
                }
            }
            Check::OutputsObserved => {
                let missing: Vec<String> = reports
                    .iter()
                    .flat_map(|report| &report.divergences)
                    .filter_map(|divergence| match divergence {
                        Divergence::OutputMissing { output } => Some(output.clone()),
                        _ => None,
                    })
                    .collect();
                CheckOutcome::OutputsObserved {
                    passed: missing.is_empty(),
                    missing,
                }
            }
            Check::Deterministic => {
                let unstable_tasks = match second {
                    Some(second) => unstable_tasks(reports, second),
                    None => reports.iter().map(|report| report.task_index).collect(),
                };
                CheckOutcome::Deterministic {
                    passed: second.is_some() && unstable_tasks.is_empty(),
                    unstable_tasks,
                }
            }
            Check::NoDivergence => {
                let divergences = reports.iter().map(|report| report.divergences.len()).sum();
                CheckOutcome::NoDivergence {
                    passed: divergences == 0,
                    divergences,
                }
            }
        };
        debug!(check = outcome.label(), passed = outcome.passed(), "check result");
        outcomes.push(outcome);
    }
    Judgment { checks: outcomes }
}

fn unstable_tasks(first: &[TaskReport], second: &[TaskReport]) -> Vec<usize> {
    let mut unstable: Vec<usize> = first
        .iter()
        .zip(second)
        .filter(|(left, right)| left.fingerprint != right.fingerprint)
        .map(|(left, _)| left.task_index)
        .collect();
    if first.len() != second.len() {
        let longer = if first.len() > second.len() { first } else { second };
        let shorter = first.len().min(second.len());
        unstable.extend(longer[shorter..].iter().map(|report| report.task_index));
    }
    unstable
}
