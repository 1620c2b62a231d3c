use std::fmt;

use crate::lock::LockError;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    NotFound,
    InvalidStateTransition,
    ValidationFailed,
    CycleDetected,
    CorruptStore,
    StoreWriteFailed,
    LockContention,
    ProviderUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::ValidationFailed => "E2003",
            Self::CycleDetected => "E2004",
            Self::CorruptStore => "E3001",
            Self::StoreWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::ProviderUnavailable => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "Record not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::ValidationFailed => "Validation failed",
            Self::CycleDetected => "Dependency cycle would be created",
            Self::CorruptStore => "Corrupt stored payload",
            Self::StoreWriteFailed => "Store write failed",
            Self::LockContention => "Lock contention",
            Self::ProviderUnavailable => "Content provider unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rt init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .ratify/config.toml and retry."),
            Self::NotFound => None,
            Self::InvalidStateTransition => Some(
                "Follow the proposal lifecycle: draft -> pending_review -> approved/partially_approved -> applied.",
            ),
            Self::ValidationFailed => Some("Correct the named field and resubmit."),
            Self::CycleDetected => Some("Drop the dependency item or break the existing chain."),
            Self::CorruptStore => Some("Inspect the stored row; it no longer matches the schema."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other writer releases the proposal."),
            Self::ProviderUnavailable => {
                Some("Content was stored verbatim; edit the fallback item by hand.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by workflow operations.
///
/// Every variant maps to an [`ErrorCode`]. Provider failures never appear
/// here: content processing recovers them with a deterministic fallback.
#[derive(Debug, thiserror::Error)]
pub enum RatifyError {
    /// Malformed input, reported against the offending field.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// An illegal state change (wrong actor, wrong state, empty item set).
    #[error("invalid transition {edge}: {reason}")]
    InvalidTransition { edge: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A dependency item would close a cycle in the task graph.
    #[error("dependency {from} -> {to} would create a cycle")]
    Cycle { from: String, to: String },

    #[error("store error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("corrupt stored payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RatifyError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn transition(
        from: impl fmt::Display,
        to: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            edge: format!("{from} -> {to}"),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Cycle { .. } => ErrorCode::CycleDetected,
            Self::Persistence(_) | Self::Io(_) => ErrorCode::StoreWriteFailed,
            Self::Lock(err) => err.code(),
            Self::Corrupt(_) => ErrorCode::CorruptStore,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = RatifyError> = std::result::Result<T, E>;
