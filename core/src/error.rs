//! Structured error types for memcat
//!
//! Failures are split into two kinds. Transport failures never reached a
//! provider that could answer (connection refused, DNS, timeouts) and are
//! worth retrying. Logical failures got an answer that was unusable (error
//! status, malformed payload, bad configuration) and are not retried.

use thiserror::Error;

/// Which side of the retry boundary an error falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never completed; retried with backoff
    Transport,
    /// The request completed but the outcome is unusable; reported once
    Logical,
}

/// Errors raised while talking to an LLM provider
#[derive(Error, Debug)]
pub enum LlmError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Connection refused, DNS failure, TLS handshake failure
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Connect or read timeout
    #[error("request timed out: {message}")]
    Timeout { message: String },

    // =========================================================================
    // Logical Errors
    // =========================================================================
    /// Provider answered with a non-success status (includes 429)
    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    /// Provider answered but the payload could not be interpreted
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Credential or endpoint unusable for building a request
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => ErrorKind::Transport,
            Self::Provider { .. } | Self::MalformedResponse { .. } | Self::InvalidConfig { .. } => {
                ErrorKind::Logical
            }
        }
    }

    /// Check if error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

/// Classify reqwest failures: anything that happened before a response
/// arrived is transport, body decoding problems are logical
impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            Self::ConnectionFailed {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Provider {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::malformed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Error returned by [`crate::memory::MemoryCategorizer::categorize`]
///
/// Routine failures resolve to an empty category list instead; this is
/// only produced once transport failures outlast the retry policy.
#[derive(Error, Debug)]
pub enum CategorizeError {
    #[error("categorization failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: LlmError,
    },
}

/// Result type alias using LlmError
pub type Result<T> = std::result::Result<T, LlmError>;
