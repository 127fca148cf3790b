//! Agents the runner can drive.

use std::collections::VecDeque;

use crate::task::Action;

pub trait Agent {
    /// Next action given the latest observation, or `None` to finish.
    fn next_action(&mut self, observation: &str) -> Option<Action>;
}

/// Replays a fixed action list, ignoring observations.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    actions: VecDeque<Action>,
}

impl ScriptedAgent {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions: actions.into(),
        }
    }
}

impl Agent for ScriptedAgent {
    fn next_action(&mut self, _observation: &str) -> Option<Action> {
        self.actions.pop_front()
    }
}
