//! Environment configuration (TOML).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::catalog::naming::Interface;
use crate::core::clock::Clock;
use crate::domains::Domain;
use crate::task::Split;

/// Everything needed to build an [`crate::env::Environment`].
///
/// Intended to be edited by humans; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvConfig {
    /// Directory holding one subdirectory per domain.
    pub data_root: PathBuf,

    pub domain: Domain,

    /// Which of the five naming variants the catalog exposes.
    pub interface: Interface,

    /// Task list to load.
    pub split: Split,

    /// Overrides the domain's deterministic timestamp.
    pub timestamp: Option<String>,

    /// User simulator strategy name.
    pub user_strategy: String,

    /// Upper bound on agent steps per episode.
    pub max_steps: u32,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            domain: Domain::Airline,
            interface: Interface::default(),
            split: Split::Test,
            timestamp: None,
            user_strategy: "instruction".to_string(),
            max_steps: 30,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.user_strategy.trim().is_empty() {
            return Err(anyhow!("user_strategy must not be empty"));
        }
        if let Some(timestamp) = &self.timestamp {
            Clock::fixed(timestamp).map_err(|err| anyhow!("timestamp: {err}"))?;
        }
        Ok(())
    }

    /// The configured timestamp, or the domain default.
    pub fn timestamp(&self) -> &str {
        self.timestamp
            .as_deref()
            .unwrap_or_else(|| self.domain.default_timestamp())
    }

    pub fn clock(&self) -> Result<Clock> {
        Clock::fixed(self.timestamp()).map_err(|err| anyhow!("timestamp: {err}"))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EnvConfig::default()`.
pub fn load_config(path: &Path) -> Result<EnvConfig> {
    if !path.exists() {
        let cfg = EnvConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EnvConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EnvConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
