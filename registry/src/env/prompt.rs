//! Agent-facing system prompt.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::domains::{Domain, TRANSFER_TOOL};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

#[derive(Debug, Clone, Serialize)]
struct ToolSummary {
    name: String,
    description: String,
}

/// Render the system prompt from prompt material and the catalog.
pub fn render_system_prompt(domain: Domain, catalog: &Catalog, rules: &str, wiki: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system prompt template")?;
    let tools: Vec<ToolSummary> = catalog
        .tools()
        .map(|tool| ToolSummary {
            name: tool.name().to_string(),
            description: tool.operation().description.clone(),
        })
        .collect();
    let template = env.get_template("system")?;
    let rendered = template
        .render(context! {
            domain => domain.as_str(),
            interface => catalog.interface().number(),
            rules => (!rules.trim().is_empty()).then(|| rules.trim()),
            wiki => (!wiki.trim().is_empty()).then(|| wiki.trim()),
            tools => tools,
            transfer_tool => TRANSFER_TOOL,
        })
        .context("render system prompt")?;
    Ok(rendered)
}
