//! Error types for the resumable upload engine.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type for upload engine operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Top-level error type for the resumable upload engine.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Failed to obtain a session URI from the server. Fatal to this session.
    #[error("session init failed: {0}")]
    SessionInit(String),

    /// The source stream could not be read. Fatal.
    #[error("source read failed: {0}")]
    SourceRead(String),

    /// Network failure on a chunk attempt. Passed to the Pacer's retry predicate.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-retryable server rejection, surfaced after the Pacer exhausts retries.
    #[error("http error (status {status}): {message}")]
    Http {
        /// The HTTP status code returned by the server.
        status: u16,
        /// The server's error message, if any could be extracted.
        message: String,
    },

    /// A terminal 2xx body did not parse. The upload may have succeeded
    /// server-side; the caller must reconcile.
    #[error("failed to decode terminal response: {0}")]
    Decode(String),

    /// The Consumer drained to completion without ever decoding a terminal
    /// body. Retryable: the caller is advised to retry the whole session.
    #[error("upload incomplete, last observed status {last_status}")]
    Incomplete {
        /// The last HTTP status code observed before the stream ended.
        last_status: u16,
    },

    /// The upload was cancelled via the session's cancellation token.
    #[error("upload cancelled")]
    Cancelled,

    /// An internal invariant was violated badly enough to abort the session
    /// (see the terminal consistency check in the Consumer).
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl UploadError {
    /// Returns true if the error should be retried by the Pacer.
    ///
    /// Note this is distinct from the Consumer/Coordinator-level decision to
    /// return an `Incomplete` (retryable-whole-session) error: this predicate
    /// only governs whether a *single chunk attempt* should be retried inside
    /// [`crate::resilience::Pacer::call`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::Transport(_)
                | UploadError::Http {
                    status: 500..=599,
                    ..
                }
        )
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            UploadError::Http { status, .. } => StatusCode::from_u16(*status).ok(),
            UploadError::Incomplete { last_status } => StatusCode::from_u16(*last_status).ok(),
            _ => None,
        }
    }

    /// Returns a server-suggested retry delay, if the error carries one.
    ///
    /// The engine's own errors never carry a `Retry-After` hint today (the
    /// Pacer computes backoff itself); this exists so callers composing the
    /// Pacer with richer error types have a stable extension point.
    pub fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(UploadError::Transport("boom".into()).is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = UploadError::Http {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = UploadError::Http {
            status: 400,
            message: "bad request".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn session_init_errors_are_not_retryable_by_the_pacer() {
        assert!(!UploadError::SessionInit("no location header".into()).is_retryable());
    }

    #[test]
    fn incomplete_carries_last_status() {
        let err = UploadError::Incomplete { last_status: 308 };
        assert_eq!(err.status_code(), Some(StatusCode::PERMANENT_REDIRECT));
    }
}
