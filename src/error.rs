//! Error types for notebook-puppet operations.

use thiserror::Error;

/// Result type alias for notebook-puppet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the NotebookLM UI.
#[derive(Error, Debug)]
pub enum Error {
    /// An untrusted input was rejected by the security gate.
    ///
    /// Never retried automatically; the reason is the gate's specific,
    /// human-readable rejection cause.
    #[error("validation rejected: {reason}")]
    Validation {
        /// Why the input was rejected.
        reason: String,
    },

    /// A wait operation hit its deadline before the observed value settled.
    #[error("timed out after {waited_ms}ms (last observed: {last_observed:?})")]
    Timeout {
        /// Wall-clock milliseconds spent waiting.
        waited_ms: u64,
        /// Last value the probe observed, if any. Distinguishes
        /// "never started" (`None`) from "started but never settled".
        last_observed: Option<String>,
    },

    /// Browser failed to launch, crashed, or a CDP call failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// Navigation failed (bad URL, page error, redirect loop).
    #[error("navigation error: {0}")]
    Navigation(String),

    /// Element not found on page.
    #[error("element not found: {selector}")]
    ElementNotFound {
        /// CSS selector that failed.
        selector: String,
    },

    /// Authentication failed or the session is not signed in.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Failure reason.
        reason: String,
    },

    /// Configuration error (misconfiguration is fatal at startup).
    #[error("configuration error: {0}")]
    Config(String),

    /// Action dispatch failed after validation (spawn error, bad exit).
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if a fresh session could plausibly succeed.
    ///
    /// Gate rejections and configuration errors are never retryable;
    /// timeouts and browser faults may be, with a new session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Browser(_) | Error::Navigation(_)
        )
    }

    /// Process exit code for this error at the dispatch boundary.
    ///
    /// Zero is reserved for success; every fatal path maps to non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation { .. } => 2,
            Error::AuthenticationFailed { .. } => 3,
            Error::Timeout { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_retryable() {
        let err = Error::Validation {
            reason: "not in allowlist".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn timeout_carries_last_observation() {
        let err = Error::Timeout {
            waited_ms: 120_000,
            last_observed: Some("partial answer".into()),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("partial answer"));
    }
}
