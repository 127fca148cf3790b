//! Tool failure taxonomy.
//!
//! Every tool either succeeds or signals exactly one [`ToolError`]. The kind is
//! stable and machine-readable; the message is what the agent sees and what
//! the runner records verbatim.

use serde::Serialize;
use thiserror::Error;

/// Classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced entity absent.
    NotFound,
    /// Value outside the allowed vocabulary.
    InvalidEnum,
    /// Type, shape, positivity or date-ordering violation.
    InvalidArgument,
    /// Uniqueness violation (email, ticker, existing link, ...).
    DuplicateKey,
    /// Disallowed state transition or active dependents on delete.
    PreconditionFailed,
    /// A required approval flag is false or absent.
    ApprovalRequired,
    /// The requested change is already in effect.
    AlreadyApplied,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidEnum => "invalid_enum",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::ApprovalRequired => "approval_required",
            ErrorKind::AlreadyApplied => "already_applied",
        }
    }
}

/// A single tool failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type ToolResult<T> = Result<T, ToolError>;

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// `"<Entity> <id> not found"`.
    pub fn not_found(label: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{label} {id} not found"))
    }

    /// `"Invalid <field>. Must be one of [a, b, c]"`.
    pub fn invalid_enum(field: &str, allowed: &[&str]) -> Self {
        Self::new(
            ErrorKind::InvalidEnum,
            format!("Invalid {field}. Must be one of [{}]", allowed.join(", ")),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateKey, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn approval_required(flag: &str) -> Self {
        Self::new(
            ErrorKind::ApprovalRequired,
            format!("Approval required: {flag} must be true"),
        )
    }

    pub fn already_applied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyApplied, message)
    }
}
