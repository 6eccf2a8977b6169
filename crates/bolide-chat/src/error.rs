// ── Chat error types ──
//
// User-facing errors from bolide-chat. Engine errors pass through
// transparently; the veneer adds only the variants that arise from
// interpreting server replies as chat semantics.

use bolide_ddp::DdpError;
use thiserror::Error;

/// Error type for everything this crate does.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The server rejected the `login` call.
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },

    /// A name-or-id lookup resolved to nothing.
    #[error("room not found: {name}")]
    RoomNotFound { name: String },

    /// A server reply did not have the shape this crate expects.
    #[error("malformed {context}: {detail}")]
    MalformedReply {
        context: &'static str,
        detail: String,
    },

    /// Anything the protocol engine reported.
    #[error(transparent)]
    Ddp(#[from] DdpError),
}

impl ChatError {
    /// True when retrying after reconnecting could help.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChatError::Ddp(e) if e.is_transient())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_pass_through() {
        let err = ChatError::from(DdpError::NotConnected);
        assert!(matches!(err, ChatError::Ddp(DdpError::NotConnected)));
        assert!(err.is_transient());
    }

    #[test]
    fn veneer_errors_are_not_transient() {
        let err = ChatError::RoomNotFound {
            name: "general".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "room not found: general");
    }
}
