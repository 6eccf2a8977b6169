// ── Subscription tracking ──
//
// Subscriptions outlive the connection that carried them: callers hold a
// stable handle, while the wire id is regenerated on every (re)issue so a
// reconnected server never sees a stale id. The registry therefore keys by
// handle and keeps a secondary wire-id index for inbound routing.
//
// Resolution of a pending subscribe is exactly-once: the acknowledgment
// sender is `take()`n under the entry lock, so of the three competitors
// (ready, nosub, caller timeout) precisely one delivers the outcome.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::DdpError;
use crate::frame::{ClientFrame, ServerError};

/// A live subscription, as seen by the caller.
///
/// Stable across reconnects; pass it back to `unsubscribe` to cancel.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    name: String,
}

impl SubscriptionHandle {
    /// The publication name this subscription was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubStatus {
    /// `sub` sent, no `ready`/`nosub` yet.
    Requested,
    /// Server confirmed initial data is fully sent.
    Ready,
    /// `unsub` sent, awaiting the confirming `nosub`.
    Unsubscribing,
}

struct SubscriptionEntry {
    name: String,
    params: Vec<Value>,
    wire_id: String,
    status: SubStatus,
    ack: Option<oneshot::Sender<Result<(), DdpError>>>,
}

/// How an inbound `nosub` was interpreted, for the session layer to log
/// or surface.
pub(crate) enum NosubOutcome {
    /// A not-yet-ready subscribe failed; the waiter already got the error.
    RequestFailed { name: String },
    /// The server terminated a ready subscription on its own.
    EndedByServer {
        name: String,
        error: Option<ServerError>,
    },
    /// Acknowledgment of our own `unsub`.
    UnsubscribeAcked { name: String },
}

/// All subscriptions the client is tracking, across connections.
pub(crate) struct SubRegistry {
    next_handle: AtomicU64,
    next_wire_id: AtomicU64,
    subs: DashMap<u64, SubscriptionEntry>,
    by_wire_id: DashMap<String, u64>,
}

impl SubRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            next_wire_id: AtomicU64::new(1),
            subs: DashMap::new(),
            by_wire_id: DashMap::new(),
        }
    }

    /// Track a new subscription in `Requested` state and hand back the
    /// handle, the wire id to put on the `sub` frame, and the receiver the
    /// caller awaits for ready/failed.
    pub(crate) fn register(
        &self,
        name: &str,
        params: Vec<Value>,
    ) -> (
        SubscriptionHandle,
        String,
        oneshot::Receiver<Result<(), DdpError>>,
    ) {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let wire_id = self.fresh_wire_id();
        let (tx, rx) = oneshot::channel();

        self.subs.insert(
            id,
            SubscriptionEntry {
                name: name.to_owned(),
                params,
                wire_id: wire_id.clone(),
                status: SubStatus::Requested,
                ack: Some(tx),
            },
        );
        self.by_wire_id.insert(wire_id.clone(), id);

        let handle = SubscriptionHandle {
            id,
            name: name.to_owned(),
        };
        (handle, wire_id, rx)
    }

    /// Apply an inbound `ready` for one wire id. Returns the publication
    /// name, or `None` when nothing matches (timed out, already removed).
    pub(crate) fn mark_ready(&self, wire_id: &str) -> Option<String> {
        let handle = self.handle_for(wire_id)?;
        let (name, ack) = {
            let mut entry = self.subs.get_mut(&handle)?;
            entry.status = SubStatus::Ready;
            (entry.name.clone(), entry.ack.take())
        };
        if let Some(ack) = ack {
            let _ = ack.send(Ok(()));
        }
        Some(name)
    }

    /// Apply an inbound `nosub`. The entry is destroyed whichever state it
    /// was in; the outcome tells the session what that meant.
    pub(crate) fn apply_nosub(
        &self,
        wire_id: &str,
        error: Option<ServerError>,
    ) -> Option<NosubOutcome> {
        let handle = self.handle_for(wire_id)?;
        let (_, mut entry) = self.subs.remove(&handle)?;
        self.by_wire_id.remove(wire_id);

        let outcome = match entry.status {
            SubStatus::Requested => {
                let reply = match error {
                    Some(server) => Err(DdpError::Server(server)),
                    None => Err(DdpError::Protocol {
                        detail: "subscription refused without an error".into(),
                    }),
                };
                if let Some(ack) = entry.ack.take() {
                    let _ = ack.send(reply);
                }
                NosubOutcome::RequestFailed { name: entry.name }
            }
            SubStatus::Ready => NosubOutcome::EndedByServer {
                name: entry.name,
                error,
            },
            SubStatus::Unsubscribing => NosubOutcome::UnsubscribeAcked { name: entry.name },
        };
        Some(outcome)
    }

    /// Claim a still-unacknowledged subscription for the timeout path.
    /// `true` means the caller won and owns the timeout outcome; `false`
    /// means ready/nosub resolved it first and the caller must await the
    /// receiver instead.
    pub(crate) fn abandon_requested(&self, wire_id: &str) -> bool {
        let Some(handle) = self.handle_for(wire_id) else {
            return false;
        };
        let removed = self
            .subs
            .remove_if(&handle, |_, entry| entry.ack.is_some())
            .is_some();
        if removed {
            self.by_wire_id.remove(wire_id);
        }
        removed
    }

    /// Flag a subscription as leaving and return the wire id to put on the
    /// `unsub` frame. `None` for handles no longer tracked or already on
    /// their way out.
    pub(crate) fn begin_unsubscribe(&self, handle: &SubscriptionHandle) -> Option<String> {
        let mut entry = self.subs.get_mut(&handle.id())?;
        if entry.status == SubStatus::Unsubscribing {
            return None;
        }
        entry.status = SubStatus::Unsubscribing;
        Some(entry.wire_id.clone())
    }

    /// Drop a subscription whose `nosub` never came. Fallback only, so the
    /// registry cannot grow without bound against a silent server.
    pub(crate) fn force_remove(&self, handle_id: u64) -> bool {
        let Some((_, entry)) = self.subs.remove(&handle_id) else {
            return false;
        };
        self.by_wire_id.remove(&entry.wire_id);
        true
    }

    /// Connection dropped: fail every caller still waiting on an
    /// acknowledgment and forget half-finished unsubscribes. Everything
    /// else stays tracked for re-issue -- that covers ready subscriptions
    /// and also waiterless `Requested` ones, which a resume re-issued but
    /// the server had not yet confirmed when this connection died too.
    pub(crate) fn on_disconnect(&self, reason: &str) {
        let doomed: Vec<u64> = self
            .subs
            .iter()
            .filter(|entry| entry.ack.is_some() || entry.status == SubStatus::Unsubscribing)
            .map(|entry| *entry.key())
            .collect();

        for handle in doomed {
            if let Some((_, mut entry)) = self.subs.remove(&handle) {
                self.by_wire_id.remove(&entry.wire_id);
                if let Some(ack) = entry.ack.take() {
                    debug!(name = %entry.name, "failing pending subscription: {reason}");
                    let _ = ack.send(Err(DdpError::connection(reason)));
                }
            }
        }
    }

    /// Forget every subscription. Terminal-shutdown path only: after
    /// this, existing handles are inert and a later connect starts from
    /// an empty registry.
    pub(crate) fn clear(&self) {
        self.subs.clear();
        self.by_wire_id.clear();
    }

    /// Build `sub` frames for every surviving subscription, each under a
    /// fresh wire id, and move them back to `Requested`. Called once per
    /// successful reconnect, before user traffic resumes.
    pub(crate) fn resubscribe_frames(&self) -> Vec<ClientFrame> {
        // A cancel recorded in the meantime stays cancelled: the server
        // side of it died with the old connection, so dropping the entry
        // is all that is left to do.
        let leaving: Vec<u64> = self
            .subs
            .iter()
            .filter(|entry| entry.status == SubStatus::Unsubscribing)
            .map(|entry| *entry.key())
            .collect();
        for handle in leaving {
            self.force_remove(handle);
        }

        let handles: Vec<u64> = self.subs.iter().map(|entry| *entry.key()).collect();
        let mut frames = Vec::with_capacity(handles.len());

        for handle in handles {
            let Some(mut entry) = self.subs.get_mut(&handle) else {
                continue;
            };
            let old_wire_id = std::mem::replace(&mut entry.wire_id, self.fresh_wire_id());
            entry.status = SubStatus::Requested;

            self.by_wire_id.remove(&old_wire_id);
            self.by_wire_id.insert(entry.wire_id.clone(), handle);

            frames.push(ClientFrame::Sub {
                id: entry.wire_id.clone(),
                name: entry.name.clone(),
                params: entry.params.clone(),
            });
        }
        frames
    }

    fn fresh_wire_id(&self) -> String {
        self.next_wire_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn handle_for(&self, wire_id: &str) -> Option<u64> {
        self.by_wire_id.get(wire_id).map(|entry| *entry.value())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.subs.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
