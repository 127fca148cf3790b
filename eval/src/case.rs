//! Case file parsing and validation.
//!
//! Cases are TOML files naming a domain, environment overrides, and the
//! checks a replay of its tasks must satisfy. See `eval/cases/` for examples.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use registry::catalog::naming::Interface;
use registry::domains::Domain;
use registry::task::Split;

/// A parsed case file containing metadata, config, and checks.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    pub case: CaseMeta,
    #[serde(default)]
    pub config: CaseConfig,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Case metadata: identifier, domain and what the case exercises.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    pub domain: Domain,
    pub description: String,
}

/// Environment overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    /// Data root, relative to the repository root unless absolute.
    pub data_root: Option<PathBuf>,
    pub interface: Option<Interface>,
    pub split: Option<Split>,
    /// Overrides the domain's deterministic timestamp.
    pub timestamp: Option<String>,
    /// Task indices to replay (default: every task in the split).
    pub tasks: Option<Vec<usize>>,
    pub max_steps: Option<u32>,
}

/// Verification check applied to the replayed tasks.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// No scripted call raised or returned a failure envelope.
    AllCallsSucceed,
    /// Every expected output appeared in some observation.
    OutputsObserved,
    /// A second replay ends on the same store fingerprints.
    Deterministic,
    /// The task reports carry no divergences at all.
    NoDivergence,
}

impl Check {
    pub fn label(self) -> &'static str {
        match self {
            Check::AllCallsSucceed => "all_calls_succeed",
            Check::OutputsObserved => "outputs_observed",
            Check::Deterministic => "deterministic",
            Check::NoDivergence => "no_divergence",
        }
    }
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        let case: CaseFile =
            toml::from_str(&contents).with_context(|| format!("parse case {}", path.display()))?;
        case.validate()
            .with_context(|| format!("validate case {}", path.display()))?;
        Ok(case)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    pub fn wants(&self, check: Check) -> bool {
        self.checks.contains(&check)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.description.trim().is_empty() {
            bail!("case.description must be non-empty");
        }
        if self.config.max_steps == Some(0) {
            bail!("config.max_steps must be > 0");
        }
        if self.config.tasks.as_ref().is_some_and(Vec::is_empty) {
            bail!("config.tasks must be a non-empty array when set");
        }
        if self.checks.is_empty() {
            bail!("checks must be a non-empty array");
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("case.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("case.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}
