//! Filesystem access: configuration, fixtures, task lists and prompt material.
//!
//! Everything here returns `anyhow::Result` with path context; the pure
//! logic in [`crate::core`] never touches the disk.

pub mod config;
pub mod fixtures;
pub mod paths;
pub mod tasks;
