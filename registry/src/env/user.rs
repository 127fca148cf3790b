//! User simulators: the other side of the conversation.

use anyhow::{Result, bail};

/// Message a simulator sends to end the episode.
pub const STOP: &str = "###STOP###";

/// Strategy names accepted by [`load_user`].
pub const STRATEGIES: &[&str] = &["instruction"];

pub trait UserSimulator: Send {
    /// First user message for a fresh episode.
    fn reset(&mut self, instruction: &str) -> String;

    /// Reply to an agent response. Returning [`STOP`] ends the episode.
    fn step(&mut self, content: &str) -> String;
}

/// States the task instruction, then stops at the first agent response.
#[derive(Debug, Default)]
pub struct InstructionUser {
    instruction: String,
}

impl UserSimulator for InstructionUser {
    fn reset(&mut self, instruction: &str) -> String {
        self.instruction = instruction.to_string();
        self.instruction.clone()
    }

    fn step(&mut self, _content: &str) -> String {
        STOP.to_string()
    }
}

pub fn load_user(strategy: &str) -> Result<Box<dyn UserSimulator>> {
    match strategy {
        "instruction" => Ok(Box::new(InstructionUser::default())),
        other => bail!(
            "unknown user strategy '{other}' (expected one of: {})",
            STRATEGIES.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_user_stops_after_first_reply() {
        let mut user = load_user("instruction").expect("strategy");
        assert_eq!(user.reset("Cancel order SO0455."), "Cancel order SO0455.");
        assert_eq!(user.step("Done."), STOP);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = load_user("llm").err().expect("unknown");
        assert!(err.to_string().contains("unknown user strategy 'llm'"));
    }
}
