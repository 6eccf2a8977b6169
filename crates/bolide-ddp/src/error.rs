use std::time::Duration;

use thiserror::Error;

use crate::frame::ServerError;

/// Top-level error type for the `bolide-ddp` crate.
///
/// Covers every failure mode of the engine: connection establishment,
/// per-operation deadlines, structured server refusals, and wire-level
/// protocol violations. Consumers branch on the variant; none of these
/// ever escapes as a panic out of the receive loop.
#[derive(Debug, Error)]
pub enum DdpError {
    // ── Connection ──────────────────────────────────────────────────
    /// Handshake or transport failure. Fatal to the in-flight operation;
    /// recoverable by caller retry or the automatic reconnect policy.
    #[error("connection failed: {reason}")]
    Connection { reason: String },

    /// An operation was attempted while the session is not Connected.
    /// Nothing is queued: re-sending a method that may already have run
    /// server-side could double-apply non-idempotent effects.
    #[error("not connected")]
    NotConnected,

    /// The client has been shut down via `disconnect()`.
    #[error("client closed")]
    Closed,

    // ── Per-operation ───────────────────────────────────────────────
    /// No matching response arrived within the deadline. The pending
    /// entry has been cleaned up; a later response is discarded.
    #[error("no response within {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The server explicitly reported an error for this method or
    /// subscription. A value-level outcome, not a transport fault -- the
    /// session remains fully usable.
    #[error("server error: {0}")]
    Server(ServerError),

    // ── Wire ────────────────────────────────────────────────────────
    /// A malformed or unroutable frame. Logged and dropped at the
    /// dispatch boundary; surfaces as an error only from APIs that parse
    /// caller-supplied payloads.
    #[error("protocol violation: {detail}")]
    Protocol { detail: String },
}

impl DdpError {
    /// Returns `true` if this error indicates the connection was the
    /// problem, so the same operation may succeed after a reconnect.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::NotConnected | Self::Closed)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::NotConnected | Self::Timeout { .. }
        )
    }

    /// The structured server error, if that is what this is.
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Server(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_errors_are_transient() {
        assert!(DdpError::connection("socket closed").is_transient());
        assert!(DdpError::NotConnected.is_transient());
        assert!(
            DdpError::Timeout {
                elapsed: Duration::from_secs(5)
            }
            .is_transient()
        );
    }

    #[test]
    fn server_errors_are_not_transient() {
        let err = DdpError::Server(ServerError {
            error: json!("error-invalid-user"),
            reason: Some("Invalid user".into()),
            message: None,
            error_type: None,
            details: None,
        });

        assert!(!err.is_transient());
        assert!(!err.is_connection());
        assert_eq!(
            err.as_server_error().unwrap().code(),
            Some("error-invalid-user")
        );
    }
}
