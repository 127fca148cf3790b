//! Typed access to tool keyword arguments.
//!
//! Arguments have already been checked against the tool's parameter schema
//! by the time a handler reads them; these accessors still fail with
//! `InvalidArgument` rather than panicking when a value has the wrong shape.

use serde_json::{Map, Value};

use crate::core::error::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn raw(&self) -> &'a Map<String, Value> {
        self.map
    }

    /// The value of `name`; `null` counts as absent.
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|value| !value.is_null())
    }

    pub fn has(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn str(&self, name: &str) -> ToolResult<&'a str> {
        self.opt_str(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_str(&self, name: &str) -> ToolResult<Option<&'a str>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.as_str())),
            Some(_) => Err(wrong_type(name, "a string")),
        }
    }

    /// An identifier given as a string or an integer.
    pub fn id(&self, name: &str) -> ToolResult<String> {
        self.opt_id(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_id(&self, name: &str) -> ToolResult<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
            Some(Value::Number(number)) if number.is_u64() || number.is_i64() => {
                Ok(Some(number.to_string()))
            }
            Some(_) => Err(wrong_type(name, "an identifier")),
        }
    }

    pub fn f64(&self, name: &str) -> ToolResult<f64> {
        self.opt_f64(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_f64(&self, name: &str) -> ToolResult<Option<f64>> {
        match self.value(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| wrong_type(name, "a number")),
        }
    }

    pub fn i64(&self, name: &str) -> ToolResult<i64> {
        self.opt_i64(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_i64(&self, name: &str) -> ToolResult<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| wrong_type(name, "an integer")),
        }
    }

    pub fn opt_bool(&self, name: &str) -> ToolResult<Option<bool>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(_) => Err(wrong_type(name, "a boolean")),
        }
    }

    /// Approval flag: absent and non-boolean both read as "not approved".
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }
}

fn missing(name: &str) -> ToolError {
    ToolError::invalid_argument(format!("Missing required argument: {name}"))
}

fn wrong_type(name: &str, expected: &str) -> ToolError {
    ToolError::invalid_argument(format!("{name} must be {expected}"))
}
