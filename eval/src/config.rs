//! Environment configuration merging.
//!
//! Applies case-specific overrides to the default environment configuration.

use std::path::Path;

use anyhow::Result;
use registry::io::config::EnvConfig;

use crate::case::CaseFile;

/// Apply the case's domain and overrides to `base`.
///
/// A relative `data_root` is resolved against `repo_root`.
pub fn apply_case_config(mut base: EnvConfig, case: &CaseFile, repo_root: &Path) -> Result<EnvConfig> {
    let overrides = &case.config;
    base.domain = case.case.domain;
    if let Some(data_root) = &overrides.data_root {
        base.data_root = data_root.clone();
    }
    if let Some(interface) = overrides.interface {
        base.interface = interface;
    }
    if let Some(split) = overrides.split {
        base.split = split;
    }
    if let Some(timestamp) = &overrides.timestamp {
        base.timestamp = Some(timestamp.clone());
    }
    if let Some(max_steps) = overrides.max_steps {
        base.max_steps = max_steps;
    }
    if base.data_root.is_relative() {
        base.data_root = repo_root.join(&base.data_root);
    }
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseConfig, CaseMeta, Check};
    use registry::catalog::naming::Interface;
    use registry::domains::Domain;

    fn case(config: CaseConfig) -> CaseFile {
        CaseFile {
            case: CaseMeta {
                id: "case".to_string(),
                domain: Domain::SmartHome,
                description: "x".to_string(),
            },
            config,
            checks: vec![Check::NoDivergence],
        }
    }

    #[test]
    fn keeps_defaults_when_no_override() {
        let merged = apply_case_config(EnvConfig::default(), &case(CaseConfig::default()), Path::new("/repo"))
            .expect("merge");
        assert_eq!(merged.domain, Domain::SmartHome);
        assert_eq!(merged.interface, Interface::default());
        assert_eq!(merged.data_root, Path::new("/repo/data"));
        assert_eq!(merged.max_steps, EnvConfig::default().max_steps);
    }

    #[test]
    fn applies_overrides() {
        let overrides = CaseConfig {
            data_root: Some("/fixtures".into()),
            interface: Some(Interface::new(5).expect("interface")),
            timestamp: Some("2025-03-01T00:00:00Z".to_string()),
            max_steps: Some(4),
            ..CaseConfig::default()
        };
        let merged = apply_case_config(EnvConfig::default(), &case(overrides), Path::new("/repo"))
            .expect("merge");
        assert_eq!(merged.data_root, Path::new("/fixtures"));
        assert_eq!(merged.interface.number(), 5);
        assert_eq!(merged.timestamp(), "2025-03-01T00:00:00Z");
        assert_eq!(merged.max_steps, 4);
    }

    #[test]
    fn rejects_bad_timestamp() {
        let overrides = CaseConfig {
            timestamp: Some("soon".to_string()),
            ..CaseConfig::default()
        };
        assert!(apply_case_config(EnvConfig::default(), &case(overrides), Path::new("/repo")).is_err());
    }
}
