//! On-disk layout of one domain's data.
//!
//! ```text
//! <data_root>/<domain>/
//!   data/<collection>.json
//!   tasks/<split>.json
//!   rules.md        (optional)
//!   wiki.md         (optional)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domains::Domain;
use crate::task::Split;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPaths {
    root: PathBuf,
}

impl DomainPaths {
    pub fn new(data_root: &Path, domain: Domain) -> Self {
        Self {
            root: data_root.join(domain.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn tasks_file(&self, split: Split) -> PathBuf {
        self.root.join("tasks").join(format!("{split}.json"))
    }

    pub fn rules_file(&self) -> PathBuf {
        self.root.join("rules.md")
    }

    pub fn wiki_file(&self) -> PathBuf {
        self.root.join("wiki.md")
    }
}

/// Read an optional prompt text file; a missing file is empty text.
pub fn read_optional_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
