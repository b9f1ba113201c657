use std::fmt;

use crate::model::item::InvalidTransition;
use crate::store::StoreError;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ItemNotFound,
    InvalidOperation,
    StoreUnavailable,
    CorruptStore,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::InvalidOperation => "E2002",
            Self::StoreUnavailable => "E5001",
            Self::CorruptStore => "E5003",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Item not found",
            Self::InvalidOperation => "Invalid operation",
            Self::StoreUnavailable => "Store unavailable",
            Self::CorruptStore => "Store contents could not be parsed",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .lapse/config.toml and retry."),
            Self::ItemNotFound => Some("Check the item ID with `lapse list`."),
            Self::InvalidOperation => Some(
                "Accept needs a pending item; only requests can be abandoned and only projects archived.",
            ),
            Self::StoreUnavailable => Some("Check that the store path is readable and writable, then retry."),
            Self::CorruptStore => Some("Restore the item file from a backup or fix the JSON by hand."),
            Self::LockContention => Some("Retry after the other `lapse` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures surfaced by lifecycle operations.
///
/// The retention sweep never produces one of these; only controller calls and
/// store access do.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("item '{id}' not found")]
    NotFound { id: String },

    #[error("cannot {action} '{id}': {reason}")]
    InvalidOperation {
        id: String,
        action: crate::model::item::Action,
        reason: &'static str,
    },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl LifecycleError {
    pub(crate) fn invalid(id: &str, err: InvalidTransition) -> Self {
        Self::InvalidOperation {
            id: id.to_string(),
            action: err.action,
            reason: err.reason,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::InvalidOperation { .. } => ErrorCode::InvalidOperation,
            Self::StoreUnavailable(err) => err.code(),
        }
    }

    /// Remediation hint for operators.
    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::InvalidOperation { reason, .. } => format!("Not allowed: {reason}."),
            other => other
                .code()
                .hint()
                .unwrap_or_else(|| other.code().message())
                .to_string(),
        }
    }
}
