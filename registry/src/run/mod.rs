//! Task runner: executes scripts or drives agents and reports divergences.
//!
//! Two modes share one report shape:
//!
//! - [`TaskRunner::replay`] runs the task's own action script, validating the
//!   fixture and tools against it.
//! - [`TaskRunner::drive`] lets an [`Agent`] act and compares its calls and
//!   final store with the script's.

pub mod agent;
pub mod compare;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::env::reward::missing_outputs;
use crate::env::{Environment, RESPOND_ACTION};
use crate::task::Action;

use self::agent::Agent;
use self::compare::same_call;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Replay,
    Drive,
}

/// One way a run departed from the script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// A call failed (raised or returned a failure envelope).
    CallFailed {
        step: usize,
        name: String,
        observation: String,
    },
    /// An expected output never appeared.
    OutputMissing { output: String },
    /// The agent's call at `position` differs from the script's.
    UnexpectedCall {
        position: usize,
        expected: Option<Action>,
        actual: Action,
    },
    /// The run stopped before making this scripted call.
    MissingCall { position: usize, expected: Action },
    /// Final store differs from the gold store at these `collection/key` paths.
    StoreMismatch { paths: Vec<String> },
    /// The step limit ended the episode.
    StepLimit { max_steps: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: Action,
    pub observation: String,
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_index: usize,
    pub mode: Mode,
    pub steps: Vec<StepRecord>,
    pub divergences: Vec<Divergence>,
    pub passed: bool,
    /// Fingerprint of the final store.
    pub fingerprint: String,
    pub reward: f64,
}

impl TaskReport {
    pub fn failed_calls(&self) -> usize {
        self.steps.iter().filter(|step| step.failed).count()
    }
}

pub struct TaskRunner<'e> {
    env: &'e mut Environment,
}

impl<'e> TaskRunner<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        Self { env }
    }

    /// Execute the task's scripted actions directly.
    ///
    /// Expected outputs are looked for in the tool observations. Actions left
    /// unexecuted when the episode ends early are reported as missing calls.
    #[instrument(skip(self))]
    pub fn replay(&mut self, task_index: usize) -> Result<TaskReport> {
        let reset = self.env.reset(task_index)?;
        let mut steps = Vec::new();
        let mut divergences = Vec::new();
        for (position, action) in reset.task.actions.iter().enumerate() {
            if self.env.is_done() {
                divergences.extend(reset.task.actions[position..].iter().enumerate().map(
                    |(offset, expected)| Divergence::MissingCall {
                        position: position + offset,
                        expected: expected.clone(),
                    },
                ));
                break;
            }
            let response = self.env.step(action)?;
            if response.info.failed {
                divergences.push(Divergence::CallFailed {
                    step: steps.len(),
                    name: action.name.clone(),
                    observation: response.observation.clone(),
                });
            }
            steps.push(StepRecord {
                index: steps.len(),
                action: action.clone(),
                observation: response.observation,
                failed: response.info.failed,
            });
        }

        let observed: Vec<String> = steps.iter().map(|step| step.observation.clone()).collect();
        for output in missing_outputs(&reset.task.outputs, &observed) {
            divergences.push(Divergence::OutputMissing { output });
        }
        let scored = self.env.score(&observed)?;
        Ok(self.finish(task_index, Mode::Replay, steps, divergences, scored.reward))
    }

    /// Let `agent` act until it finishes, the episode ends, or the step limit.
    #[instrument(skip(self, agent))]
    pub fn drive(&mut self, task_index: usize, agent: &mut dyn Agent) -> Result<TaskReport> {
        let reset = self.env.reset(task_index)?;
        let mut observation = reset.observation;
        let mut steps = Vec::new();
        let mut divergences = Vec::new();
        let mut reward = None;

        while !self.env.is_done() {
            let Some(action) = agent.next_action(&observation) else {
                break;
            };
            let response = self.env.step(&action)?;
            if response.done {
                reward = Some(response.reward);
                if steps.len() + 1 >= self.env.max_steps() as usize
                    && response.info.source != "user"
                    && !self.env.terminate_tools().contains(&action.name)
                {
                    divergences.push(Divergence::StepLimit {
                        max_steps: self.env.max_steps(),
                    });
                }
            }
            steps.push(StepRecord {
                index: steps.len(),
                action,
                observation: response.observation.clone(),
                failed: response.info.failed,
            });
            observation = response.observation;
        }

        let calls: Vec<&Action> = steps
            .iter()
            .map(|step| &step.action)
            .filter(|action| action.name != RESPOND_ACTION)
            .collect();
        let expected = &reset.task.actions;
        for (position, actual) in calls.iter().enumerate() {
            let scripted = expected.get(position);
            if !scripted.is_some_and(|scripted| same_call(scripted, actual)) {
                divergences.push(Divergence::UnexpectedCall {
                    position,
                    expected: scripted.cloned(),
                    actual: (*actual).clone(),
                });
            }
        }
        for (position, scripted) in expected.iter().enumerate().skip(calls.len()) {
            divergences.push(Divergence::MissingCall {
                position,
                expected: scripted.clone(),
            });
        }

        let gold = self.env.gold_store(task_index)?;
        let paths = gold.diff(self.env.store());
        if !paths.is_empty() {
            divergences.push(Divergence::StoreMismatch { paths });
        }

        let responses: Vec<String> = steps
            .iter()
            .filter(|step| step.action.name == RESPOND_ACTION)
            .filter_map(|step| step.action.kwargs.get("content"))
            .filter_map(|content| content.as_str().map(str::to_string))
            .collect();
        for output in missing_outputs(&reset.task.outputs, &responses) {
            divergences.push(Divergence::OutputMissing { output });
        }
        let reward = match reward {
            Some(reward) => reward,
            None => self.env.score(&responses)?.reward,
        };
        Ok(self.finish(task_index, Mode::Drive, steps, divergences, reward))
    }

    fn finish(
        &self,
        task_index: usize,
        mode: Mode,
        steps: Vec<StepRecord>,
        divergences: Vec<Divergence>,
        reward: f64,
    ) -> TaskReport {
        let passed = divergences.is_empty();
        if passed {
            info!(task_index, steps = steps.len(), reward, "task passed");
        } else {
            warn!(task_index, divergences = divergences.len(), reward, "task diverged");
        }
        TaskReport {
            task_index,
            mode,
            steps,
            divergences,
            passed,
            fingerprint: self.env.store().fingerprint(),
            reward,
        }
    }
}
