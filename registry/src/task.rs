//! Scripted task records and task-list splits.
//!
//! Tasks are data: the loader rejects malformed entries instead of guessing.
//! The runner never interprets `instruction`; it is handed to the user
//! simulator verbatim.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::naming::Interface;

/// One expected tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Action {
    pub fn new(name: impl Into<String>, kwargs: Value) -> Self {
        let kwargs = match kwargs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            kwargs,
        }
    }

    pub fn kwargs_value(&self) -> Value {
        Value::Object(self.kwargs.clone())
    }
}

/// Annotator and user references appear as numbers or strings in task files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag {
    Number(i64),
    Text(String),
}

impl Default for Tag {
    fn default() -> Self {
        Tag::Text(String::new())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Number(number) => write!(f, "{number}"),
            Tag::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub annotator: Tag,
    pub user_id: Tag,
    pub instruction: String,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Task {
    /// Structural checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<()> {
        if self.instruction.trim().is_empty() {
            bail!("instruction must not be empty");
        }
        for (position, action) in self.actions.iter().enumerate() {
            if action.name.trim().is_empty() {
                bail!("action {position} has an empty name");
            }
        }
        Ok(())
    }
}

/// Named task list: `test` or `test_interface_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Split {
    #[default]
    Test,
    Interface(Interface),
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Test => f.write_str("test"),
            Split::Interface(interface) => write!(f, "test_interface_{interface}"),
        }
    }
}

impl FromStr for Split {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        if text == "test" {
            return Ok(Split::Test);
        }
        let number = text
            .strip_prefix("test_interface_")
            .and_then(|suffix| suffix.parse::<u8>().ok())
            .ok_or_else(|| anyhow!("unknown split '{text}' (expected test or test_interface_1..5)"))?;
        Ok(Split::Interface(Interface::new(number)?))
    }
}

impl TryFrom<String> for Split {
    type Error = anyhow::Error;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl From<Split> for String {
    fn from(split: Split) -> String {
        split.to_string()
    }
}
