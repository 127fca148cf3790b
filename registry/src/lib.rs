//! Mock tool registry for evaluating LLM agents on business-domain tasks.
//!
//! Each domain exposes a catalog of named tools over a shared, in-memory,
//! JSON-shaped store. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (store, validation kernel, ids,
//!   lifecycles, filters). No I/O, fully testable in isolation.
//! - **[`contract`]** and **[`catalog`]**: the uniform tool contract and the
//!   naming layer that projects canonical operations into five interfaces.
//! - **[`domains`]**: per-domain entity specs and operations.
//! - **[`io`]**: Side-effecting operations (fixtures, task files, config).
//!
//! [`env`] binds a catalog to fixture data and a user simulator; [`run`]
//! replays or drives tasks against it and reports divergences.

pub mod catalog;
pub mod contract;
pub mod core;
pub mod domains;
pub mod env;
pub mod io;
pub mod logging;
pub mod run;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
