//! The uniform tool contract.
//!
//! An [`Operation`] is defined once: parameters, description, failure surface
//! and handler. A [`Tool`] is an operation exposed under one name in one
//! catalog. It owns the compiled argument schema and is the single wrapper
//! every call goes through:
//!
//! 1. kwargs are validated against the schema (unknown keys rejected),
//! 2. the handler runs against the store and the deterministic clock,
//! 3. on failure the store is restored to its pre-call state and the error is
//!    surfaced per the operation's [`FailMode`].

use anyhow::{Result, anyhow};
use jsonschema::Validator;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::args::Args;
use crate::core::clock::Clock;
use crate::core::error::{ToolError, ToolResult};
use crate::core::store::Store;

/// JSON type of a parameter, as shown to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Any JSON value (used by `field_value` style parameters).
    Any,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    fn type_names(self) -> Vec<&'static str> {
        match self {
            ParamType::Any => vec!["string", "number", "integer", "boolean", "object", "array"],
            other => vec![other.as_str()],
        }
    }

    /// Single type name shown to the agent. `Any` is advertised as a string;
    /// the argument schema still accepts every JSON type.
    fn descriptor_type(self) -> &'static str {
        match self {
            ParamType::Any => ParamType::String.as_str(),
            other => other.as_str(),
        }
    }
}

/// One keyword parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub description: String,
    pub allowed: Option<Vec<&'static str>>,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            allowed: None,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    /// Advertise an enum vocabulary. Membership itself is checked by the
    /// handler so the error wording stays uniform.
    pub fn one_of(mut self, allowed: &[&'static str]) -> Self {
        self.allowed = Some(allowed.to_vec());
        self
    }
}

/// How failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// The call returns `Err(ToolError)`.
    Raise,
    /// The call returns `{"error": msg}`.
    Error,
    /// The call returns `{"success": false, "error": msg, "halt": true}`.
    Halt,
}

impl FailMode {
    pub fn surface(self, err: ToolError) -> Result<String, ToolError> {
        match self {
            FailMode::Raise => fail_raise(err),
            FailMode::Error => Ok(fail_return(&err, false)),
            FailMode::Halt => Ok(fail_return(&err, true)),
        }
    }
}

pub fn fail_raise(err: ToolError) -> Result<String, ToolError> {
    Err(err)
}

/// Encode `err` as a returned envelope.
pub fn fail_return(err: &ToolError, halt: bool) -> String {
    if halt {
        json!({ "success": false, "error": err.message, "halt": true }).to_string()
    } else {
        json!({ "error": err.message }).to_string()
    }
}

/// True when a returned body is one of the failure envelopes.
pub fn is_failure_envelope(body: &str) -> bool {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    if !map.contains_key("error") {
        return false;
    }
    !matches!(map.get("success"), Some(Value::Bool(true)))
}

/// Whether the operation may write the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Read,
    Write,
}

/// How an operation's exposed name varies across interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// The leading verb is replaced per interface.
    Projected,
    /// Same name in every interface.
    Fixed,
}

/// Mutable view handed to a handler for one call.
pub struct ToolContext<'a> {
    pub store: &'a mut Store,
    pub clock: &'a Clock,
}

pub type Handler = Box<dyn Fn(&mut ToolContext<'_>, &Args<'_>) -> ToolResult<Value> + Send + Sync>;

/// A tool body, defined once and projected into every interface.
pub struct Operation {
    /// Canonical (interface 1) name.
    pub name: &'static str,
    pub naming: Naming,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub fail_mode: FailMode,
    pub effect: Effect,
    handler: Handler,
}

impl Operation {
    pub fn new<F>(name: &'static str, description: impl Into<String>, effect: Effect, handler: F) -> Self
    where
        F: Fn(&mut ToolContext<'_>, &Args<'_>) -> ToolResult<Value> + Send + Sync + 'static,
    {
        Self {
            name,
            naming: Naming::Projected,
            description: description.into(),
            params: Vec::new(),
            fail_mode: FailMode::Raise,
            effect,
            handler: Box::new(handler),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }

    pub fn fixed_name(mut self) -> Self {
        self.naming = Naming::Fixed;
        self
    }

    /// Agent-facing descriptor under `exposed_name`.
    pub fn descriptor(&self, exposed_name: &str) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(param.ty.descriptor_type()));
            property.insert("description".to_string(), json!(param.description));
            if let Some(allowed) = &param.allowed {
                property.insert("enum".to_string(), json!(allowed));
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }
        json!({
            "type": "function",
            "function": {
                "name": exposed_name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": self.required_names(),
                }
            }
        })
    }

    /// JSON Schema used to validate kwargs.
    ///
    /// Optional parameters also accept `null`; enum vocabularies are left to
    /// the handler.
    pub fn argument_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut types = param.ty.type_names();
            if !param.required {
                types.push("null");
            }
            properties.insert(param.name.clone(), json!({ "type": types }));
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
            "additionalProperties": false,
        })
    }

    fn required_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
            .collect()
    }

    pub fn call(&self, ctx: &mut ToolContext<'_>, args: &Args<'_>) -> ToolResult<Value> {
        (self.handler)(ctx, args)
    }
}

/// An operation bound to its exposed name, with its compiled argument schema.
pub struct Tool {
    name: String,
    operation: Operation,
    validator: Validator,
}

impl Tool {
    pub fn new(name: String, operation: Operation) -> Result<Self> {
        let validator = jsonschema::validator_for(&operation.argument_schema())
            .map_err(|err| anyhow!("invalid parameter schema for {name}: {err}"))?;
        Ok(Self {
            name,
            operation,
            validator,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn descriptor(&self) -> Value {
        self.operation.descriptor(&self.name)
    }

    /// Invoke with JSON kwargs. See the module docs for the call protocol.
    #[instrument(skip_all, fields(tool = %self.name))]
    pub fn invoke(&self, store: &mut Store, clock: &Clock, kwargs: &Value) -> Result<String, ToolError> {
        match self.execute(store, clock, kwargs) {
            Ok(value) => {
                debug!("tool call succeeded");
                Ok(value.to_string())
            }
            Err(err) => {
                debug!(kind = err.kind.as_str(), error = %err, "tool call failed");
                self.operation.fail_mode.surface(err)
            }
        }
    }

    fn execute(&self, store: &mut Store, clock: &Clock, kwargs: &Value) -> ToolResult<Value> {
        let arguments = self.check_arguments(kwargs)?;
        let args = Args::new(&arguments);
        if self.operation.effect == Effect::Read {
            let mut ctx = ToolContext { store, clock };
            return self.operation.call(&mut ctx, &args);
        }

        let checkpoint = store.clone();
        let result = {
            let mut ctx = ToolContext {
                store: &mut *store,
                clock,
            };
            self.operation.call(&mut ctx, &args)
        };
        if result.is_err() {
            *store = checkpoint;
        }
        result
    }

    fn check_arguments(&self, kwargs: &Value) -> ToolResult<Map<String, Value>> {
        let Value::Object(map) = kwargs else {
            return Err(ToolError::invalid_argument(format!(
                "Arguments for {} must be a JSON object",
                self.name
            )));
        };
        let messages: Vec<String> = self
            .validator
            .iter_errors(kwargs)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(ToolError::invalid_argument(format!(
                "Invalid arguments for {}: {}",
                self.name,
                messages.join("; ")
            )));
        }
        Ok(map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::record::from_value;

    fn clock() -> Clock {
        Clock::fixed("2025-01-01T00:00:00Z").expect("clock")
    }

    fn rename_tool(fail_mode: FailMode) -> Tool {
        let operation = Operation::new("update_name", "Rename a user", Effect::Write, |ctx, args| {
            let id = args.id("user_id")?;
            let name = args.str("name")?;
            let user = ctx
                .store
                .get_mut("users", &id)
                .ok_or_else(|| ToolError::not_found("User", &id))?;
            user.insert("name".to_string(), json!(name));
            if name == "boom" {
                return Err(ToolError::precondition("boom"));
            }
            Ok(Value::Object(user.clone()))
        })
        .param(ParamSpec::required("user_id", ParamType::String, "User id"))
        .param(ParamSpec::required("name", ParamType::String, "New name"))
        .param(ParamSpec::optional("note", ParamType::String, "Free text"))
        .fail_mode(fail_mode);
        Tool::new("update_name".to_string(), operation).expect("tool")
    }

    fn store() -> Store {
        let mut store = Store::new();
        store.insert("users", "1", from_value(json!({ "id": 1, "name": "Ada" })));
        store
    }

    #[test]
    fn descriptor_lists_params_and_required() {
        let tool = rename_tool(FailMode::Raise);
        let descriptor = tool.descriptor();
        assert_eq!(descriptor["type"], "function");
        assert_eq!(descriptor["function"]["name"], "update_name");
        assert_eq!(
            descriptor["function"]["parameters"]["required"],
            json!(["user_id", "name"])
        );
        assert_eq!(
            descriptor["function"]["parameters"]["properties"]["note"]["type"],
            "string"
        );
    }

    #[test]
    fn any_value_params_advertise_one_type_but_accept_all() {
        let operation = Operation::new("set_field", "Set a field", Effect::Read, |_, args| {
            Ok(args.value("field_value").cloned().unwrap_or(Value::Null))
        })
        .param(ParamSpec::required("field_value", ParamType::Any, "Any JSON value"));
        let tool = Tool::new("set_field".to_string(), operation).expect("tool");

        let property = &tool.descriptor()["function"]["parameters"]["properties"]["field_value"];
        assert_eq!(property["type"], "string");
        let mut store = store();
        for value in [json!("on"), json!(3), json!(true), json!({ "a": 1 }), json!([1])] {
            let body = tool
                .invoke(&mut store, &clock(), &json!({ "field_value": value }))
                .expect("any type accepted");
            assert_eq!(body, value.to_string());
        }
    }

    #[test]
    fn unknown_and_missing_kwargs_are_rejected() {
        let tool = rename_tool(FailMode::Raise);
        let mut store = store();
        let err = tool
            .invoke(&mut store, &clock(), &json!({ "user_id": "1", "name": "x", "bogus": 1 }))
            .expect_err("unknown kwarg");
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        let err = tool
            .invoke(&mut store, &clock(), &json!({ "user_id": "1" }))
            .expect_err("missing kwarg");
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(
            tool.invoke(&mut store, &clock(), &json!({ "user_id": "1", "name": "x", "note": null }))
                .is_ok()
        );
    }

    #[test]
    fn failure_rolls_back_partial_writes() {
        let tool = rename_tool(FailMode::Raise);
        let mut store = store();
        let before = store.clone();
        let err = tool
            .invoke(&mut store, &clock(), &json!({ "user_id": "1", "name": "boom" }))
            .expect_err("fails after write");
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);
        assert_eq!(store, before);
    }

    #[test]
    fn envelope_modes_return_bodies() {
        let mut store = store();
        let body = rename_tool(FailMode::Error)
            .invoke(&mut store, &clock(), &json!({ "user_id": "9", "name": "x" }))
            .expect("envelope");
        assert_eq!(body, r#"{"error":"User 9 not found"}"#);
        assert!(is_failure_envelope(&body));

        let body = rename_tool(FailMode::Halt)
            .invoke(&mut store, &clock(), &json!({ "user_id": "9", "name": "x" }))
            .expect("envelope");
        let parsed: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(parsed["halt"], true);
        assert_eq!(parsed["success"], false);
        assert!(is_failure_envelope(&body));
        assert!(!is_failure_envelope(r#"{"success":true}"#));
    }

    #[test]
    fn success_returns_compact_sorted_json() {
        let mut store = store();
        let body = rename_tool(FailMode::Raise)
            .invoke(&mut store, &clock(), &json!({ "user_id": 1, "name": "Grace" }))
            .expect_err("integer id rejected by schema");
        assert_eq!(body.kind, ErrorKind::InvalidArgument);
        let body = rename_tool(FailMode::Raise)
            .invoke(&mut store, &clock(), &json!({ "user_id": "1", "name": "Grace" }))
            .expect("ok");
        assert_eq!(body, r#"{"id":1,"name":"Grace"}"#);
    }
}
