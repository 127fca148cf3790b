//! Tool catalogs: one `(domain, interface)` pair mapped to named tools.

pub mod entity;
pub mod naming;
pub mod shapes;

use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail};
use serde_json::Value;
use tracing::debug;

use crate::contract::{Effect, Operation, Tool};
use crate::core::clock::Clock;
use crate::core::error::{ErrorKind, ToolError};
use crate::core::store::Store;

use self::naming::{Interface, project};

/// Named tools for one interface, in declaration order.
pub struct Catalog {
    interface: Interface,
    tools: Vec<Tool>,
    index: BTreeMap<String, usize>,
}

impl Catalog {
    /// Project every operation's name into `interface` and compile its schema.
    ///
    /// Fails when a verb is missing from the naming table or two operations
    /// project to the same name.
    pub fn build(operations: Vec<Operation>, interface: Interface) -> Result<Self> {
        let mut tools = Vec::with_capacity(operations.len());
        let mut index = BTreeMap::new();
        for operation in operations {
            let name = project(operation.name, operation.naming, interface).ok_or_else(|| {
                anyhow!(
                    "operation {} has no verb in the interface naming table",
                    operation.name
                )
            })?;
            if index.contains_key(&name) {
                bail!("duplicate tool name {name} in interface {interface}");
            }
            index.insert(name.clone(), tools.len());
            tools.push(Tool::new(name, operation)?);
        }
        debug!(interface = interface.number(), tools = tools.len(), "catalog built");
        Ok(Self {
            interface,
            tools,
            index,
        })
    }

    pub fn interface(&self) -> Interface {
        self.interface
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|position| &self.tools[*position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(Tool::name)
    }

    /// Exposed names of tools that may write the store.
    pub fn mutating_names(&self) -> impl Iterator<Item = &str> {
        self.tools
            .iter()
            .filter(|tool| tool.operation().effect == Effect::Write)
            .map(Tool::name)
    }

    /// Agent-facing descriptors, in declaration order.
    pub fn descriptors(&self) -> Vec<Value> {
        self.tools.iter().map(Tool::descriptor).collect()
    }

    /// Dispatch by exposed name. Unknown names are a `NotFound` failure.
    pub fn invoke(
        &self,
        name: &str,
        store: &mut Store,
        clock: &Clock,
        kwargs: &Value,
    ) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::new(ErrorKind::NotFound, format!("Unknown tool: {name}")))?;
        tool.invoke(store, clock, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ParamSpec, ParamType};
    use serde_json::json;

    fn noop(name: &'static str) -> Operation {
        Operation::new(name, "test operation", Effect::Read, |_, _| Ok(json!({ "ok": true })))
            .param(ParamSpec::optional("q", ParamType::String, "query"))
    }

    #[test]
    fn names_are_projected_per_interface() {
        let interface = Interface::new(2).expect("interface");
        let catalog = Catalog::build(
            vec![
                noop("get_user"),
                noop("transfer_to_human_agents").fixed_name(),
            ],
            interface,
        )
        .expect("catalog");
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["fetch_user", "transfer_to_human_agents"]);
        assert!(catalog.get("get_user").is_none());
        assert_eq!(catalog.descriptors()[0]["function"]["name"], "fetch_user");
    }

    #[test]
    fn unknown_verb_and_duplicates_fail() {
        let interface = Interface::default();
        let err = Catalog::build(vec![noop("frobnicate_user")], interface)
            .err()
            .expect("unknown verb");
        assert!(err.to_string().contains("frobnicate_user"));
        let err = Catalog::build(vec![noop("get_user"), noop("get_user")], interface)
            .err()
            .expect("duplicate");
        assert!(err.to_string().contains("duplicate tool name get_user"));
    }

    #[test]
    fn invoke_unknown_tool_is_not_found() {
        let catalog = Catalog::build(vec![noop("get_user")], Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-01-01T00:00:00Z").expect("clock");
        let mut store = Store::new();
        let err = catalog
            .invoke("get_users", &mut store, &clock, &json!({}))
            .expect_err("unknown");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "Unknown tool: get_users");
        let body = catalog
            .invoke("get_user", &mut store, &clock, &json!({ "q": "x" }))
            .expect("ok");
        assert_eq!(body, r#"{"ok":true}"#);
    }
}
