//! Error types for webpilot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for webpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed action request (bad URL, empty selector list)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No candidate selector resolved within the budget
    #[error("No element matched {candidates:?} within {elapsed_ms}ms")]
    NotFound {
        /// Candidates that were polled, in order
        candidates: Vec<String>,
        /// Time spent resolving
        elapsed_ms: u64,
    },

    /// Element was found but the primitive action failed
    #[error("Interaction failed: {0}")]
    Interaction(String),

    /// Element detached from the page between lookup and use
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    /// Timeout waiting for a page load or backend response
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Backend could not be reached or the session is gone
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Could not create the automation session
    #[error("Session initialization failed: {0}")]
    SessionInit(String),

    /// Session recreation failed after escalation
    #[error("Session lost: {0}")]
    SessionLost(String),

    /// Operation aborted by an operator interrupt
    #[error("Cancelled by operator")]
    Cancelled,

    /// Unrecognized operator input
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Structured failure kind carried in action results.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::InvalidInput(_) | Error::Parse(_) => FailureKind::InvalidInput,
            Error::NotFound { .. } => FailureKind::NotFound,
            Error::Interaction(_) | Error::StaleElement(_) => FailureKind::Interaction,
            Error::Timeout(_) => FailureKind::Timeout,
            Error::SessionInit(_) => FailureKind::SessionInit,
            Error::SessionLost(_) => FailureKind::SessionLost,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Unreachable(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Other(_) => FailureKind::Unreachable,
        }
    }
}

/// Closed set of failure categories an action attempt can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed request; never retried
    InvalidInput,
    /// No candidate resolved in time
    NotFound,
    /// Element found but the action itself failed
    Interaction,
    /// Page load or backend call timed out
    Timeout,
    /// Backend transport failure
    Unreachable,
    /// Session could not be created
    SessionInit,
    /// Session recreation failed after escalation
    SessionLost,
    /// Aborted by the operator
    Cancelled,
}

impl FailureKind {
    /// Whether the recovery controller may retry an attempt that failed this way.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            FailureKind::InvalidInput | FailureKind::SessionLost | FailureKind::Cancelled
        )
    }

    /// Short lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::NotFound => "not_found",
            FailureKind::Interaction => "interaction",
            FailureKind::Timeout => "timeout",
            FailureKind::Unreachable => "unreachable",
            FailureKind::SessionInit => "session_init",
            FailureKind::SessionLost => "session_lost",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
