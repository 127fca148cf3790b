//! Deterministic, pure logic shared by every tool.
//!
//! Core modules are free of I/O. They operate on the in-memory [`store::Store`]
//! and the injected [`clock::Clock`] and return deterministic outputs suitable
//! for tests.

pub mod args;
pub mod clock;
pub mod error;
pub mod filter;
pub mod ids;
pub mod record;
pub mod store;
pub mod transitions;
pub mod validate;
