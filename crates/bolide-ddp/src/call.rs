// ── Method call correlation ──
//
// Remote calls are matched to their `result` frames by a client-chosen id.
// The registry owns every in-flight call; whichever side removes an entry
// first (the receive loop completing it, or the caller timing it out)
// becomes the only side that resolves it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::DdpError;

/// What a finished call produced: the method's result value, or an error.
pub(crate) type CallReply = Result<Value, DdpError>;

struct PendingCall {
    method: String,
    tx: oneshot::Sender<CallReply>,
}

/// In-flight method calls, keyed by wire id.
pub(crate) struct CallRegistry {
    next_id: AtomicU64,
    pending: DashMap<String, PendingCall>,
}

impl CallRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate a fresh wire id and register the call. The returned
    /// receiver resolves exactly once, via [`complete`](Self::complete) or
    /// [`fail_all`](Self::fail_all) -- or never, if the caller won the
    /// timeout race and [`take`](Self::take) dropped the sender.
    pub(crate) fn register(&self, method: &str) -> (String, oneshot::Receiver<CallReply>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingCall {
                method: method.to_owned(),
                tx,
            },
        );
        (id, rx)
    }

    /// Resolve a call from its `result` frame. Returns `false` when the id
    /// is unknown -- already timed out, or never ours.
    pub(crate) fn complete(&self, id: &str, reply: CallReply) -> bool {
        let Some((_, call)) = self.pending.remove(id) else {
            return false;
        };
        if call.tx.send(reply).is_err() {
            // Caller gave up between our remove and this send.
            debug!(id, method = %call.method, "call receiver dropped before delivery");
        }
        true
    }

    /// Claim a call for the timeout path. `true` means the caller won the
    /// race and owns the outcome; `false` means a result is already on its
    /// way and the caller must keep waiting for it.
    pub(crate) fn take(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Fail every in-flight call, used when the transport drops. Results
    /// for these ids can no longer arrive on this connection, and a new
    /// connection will not replay them.
    pub(crate) fn fail_all(&self, reason: &str) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                debug!(id, method = %call.method, "failing in-flight call: {reason}");
                let _ = call.tx.send(Err(DdpError::connection(reason)));
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn complete_delivers_the_result() {
        let registry = CallRegistry::new();
        let (id, rx) = registry.register("getStats");

        assert!(registry.complete(&id, Ok(json!({ "count": 3 }))));

        let reply = rx.await.unwrap();
        assert_eq!(reply.unwrap(), json!({ "count": 3 }));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn complete_unknown_id_is_rejected() {
        let registry = CallRegistry::new();
        assert!(!registry.complete("404", Ok(Value::Null)));
    }

    #[tokio::test]
    async fn take_wins_the_race_and_drops_the_sender() {
        let registry = CallRegistry::new();
        let (id, rx) = registry.register("slowMethod");

        assert!(registry.take(&id));
        // A result frame arriving after the timeout finds nothing.
        assert!(!registry.complete(&id, Ok(Value::Null)));
        assert!(rx.await.is_err());
    }

    #[test]
    fn take_loses_when_already_completed() {
        let registry = CallRegistry::new();
        let (id, _rx) = registry.register("fastMethod");

        assert!(registry.complete(&id, Ok(Value::Null)));
        assert!(!registry.take(&id));
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_call() {
        let registry = CallRegistry::new();
        let (_, rx_a) = registry.register("a");
        let (_, rx_b) = registry.register("b");

        registry.fail_all("connection closed");

        for rx in [rx_a, rx_b] {
            let err = rx.await.unwrap().unwrap_err();
            assert!(err.is_connection());
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let registry = CallRegistry::new();
        let (a, _rx_a) = registry.register("m");
        let (b, _rx_b) = registry.register("m");
        assert_ne!(a, b);
    }
}
