// ── Inbound frame routing ──
//
// One pure function from inbound text to registry/mirror effects, called
// only from the driver task. Running on a single task is what serializes
// all state mutation against the socket read order; nothing here blocks
// or awaits. The only possible output is an immediate reply frame (pong),
// which the driver puts on the wire.

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::DdpError;
use crate::frame::{ClientFrame, ServerFrame};
use crate::session::{ClientInner, SessionEvent};
use crate::subscription::NosubOutcome;

/// Route one inbound message. Unparseable or unknown frames are dropped
/// with a diagnostic; this function must never take the receive loop down.
pub(crate) fn handle(inner: &ClientInner, text: &str) -> Option<ClientFrame> {
    let frame = match ServerFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            // Covers malformed JSON, unknown msg types, and the banner
            // some servers send before the handshake.
            debug!(error = %e, "dropping unrecognized message");
            return None;
        }
    };

    match frame {
        ServerFrame::Ping { id } => {
            trace!("ping, answering with pong");
            return Some(ClientFrame::Pong { id });
        }
        ServerFrame::Pong { .. } => {
            // Nothing to do: the driver already counted this frame as
            // proof of liveness, like any other inbound frame.
            trace!("pong");
        }
        ServerFrame::Result { id, result, error } => {
            let reply = match error {
                Some(server) => Err(DdpError::Server(server)),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            if !inner.calls.complete(&id, reply) {
                debug!(id, "result for unknown call, dropping");
            }
        }
        ServerFrame::Ready { subs } => {
            for wire_id in subs {
                match inner.subs.mark_ready(&wire_id) {
                    Some(name) => {
                        debug!(name, "subscription ready");
                        inner.emit(SessionEvent::SubscriptionReady { name });
                    }
                    None => debug!(id = %wire_id, "ready for unknown subscription, dropping"),
                }
            }
        }
        ServerFrame::Nosub { id, error } => match inner.subs.apply_nosub(&id, error) {
            Some(NosubOutcome::RequestFailed { name }) => {
                debug!(name, "subscription refused by server");
            }
            Some(NosubOutcome::EndedByServer { name, error }) => {
                warn!(name, "subscription ended by server");
                inner.emit(SessionEvent::SubscriptionEnded { name, error });
            }
            Some(NosubOutcome::UnsubscribeAcked { name }) => {
                debug!(name, "unsubscribe acknowledged");
            }
            None => debug!(id, "nosub for unknown subscription, dropping"),
        },
        ServerFrame::Added {
            collection,
            id,
            fields,
        } => inner.mirror.apply_added(collection, id, fields),
        ServerFrame::Changed {
            collection,
            id,
            fields,
            cleared,
        } => inner.mirror.apply_changed(&collection, &id, fields, &cleared),
        ServerFrame::Removed { collection, id } => inner.mirror.apply_removed(&collection, &id),
        ServerFrame::Connected { session } => {
            // The handshake consumed the real one; a second is a server bug.
            debug!(session, "connected frame outside handshake, dropping");
        }
        ServerFrame::Failed { version } => {
            warn!(version, "failed frame outside handshake, dropping");
        }
    }

    None
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConnectConfig;
    use serde_json::json;
    use url::Url;

    fn inner() -> ClientInner {
        let endpoint = Url::parse("ws://localhost:3000/websocket").unwrap();
        ClientInner::new(ConnectConfig::new(endpoint))
    }

    #[test]
    fn ping_yields_a_pong_with_the_same_id() {
        let inner = inner();

        let reply = handle(&inner, r#"{"msg":"ping","id":"hb-1"}"#);
        assert_eq!(reply, Some(ClientFrame::Pong { id: Some("hb-1".into()) }));

        let reply = handle(&inner, r#"{"msg":"ping"}"#);
        assert_eq!(reply, Some(ClientFrame::Pong { id: None }));
    }

    #[tokio::test]
    async fn result_resolves_the_matching_call() {
        let inner = inner();
        let (id, rx) = inner.calls.register("getServerInfo");

        let text = json!({ "msg": "result", "id": id, "result": { "version": "6.0" } }).to_string();
        assert_eq!(handle(&inner, &text), None);

        let reply = rx.await.unwrap().unwrap();
        assert_eq!(reply, json!({ "version": "6.0" }));
    }

    #[tokio::test]
    async fn result_error_surfaces_as_a_server_error() {
        let inner = inner();
        let (id, rx) = inner.calls.register("login");

        let text = json!({
            "msg": "result",
            "id": id,
            "error": { "error": 403, "reason": "User not found", "errorType": "Meteor.Error" }
        })
        .to_string();
        handle(&inner, &text);

        let err = rx.await.unwrap().unwrap_err();
        let server_err = err.as_server_error().unwrap();
        assert_eq!(server_err.error, json!(403));
        assert_eq!(server_err.reason.as_deref(), Some("User not found"));
    }

    #[tokio::test]
    async fn ready_resolves_the_matching_subscription() {
        let inner = inner();
        let (_, wire_id, rx) = inner.subs.register("stream-room-messages", vec![]);

        let text = json!({ "msg": "ready", "subs": [wire_id] }).to_string();
        handle(&inner, &text);

        rx.await.unwrap().unwrap();
    }

    #[test]
    fn document_frames_reach_the_mirror() {
        let inner = inner();

        handle(
            &inner,
            r#"{"msg":"added","collection":"users","id":"u1","fields":{"name":"ada"}}"#,
        );
        handle(
            &inner,
            r#"{"msg":"changed","collection":"users","id":"u1","fields":{"status":"online"},"cleared":["name"]}"#,
        );

        let view = inner.mirror.view("users");
        let doc = view.get("u1").unwrap();
        assert_eq!(doc.get("status"), Some(&json!("online")));
        assert_eq!(doc.get("name"), None);

        handle(&inner, r#"{"msg":"removed","collection":"users","id":"u1"}"#);
        assert!(inner.mirror.view("users").is_empty());
    }

    #[test]
    fn garbage_and_banners_are_dropped_quietly() {
        let inner = inner();

        assert_eq!(handle(&inner, "not json"), None);
        assert_eq!(handle(&inner, r#"{"server_id":"0"}"#), None);
        assert_eq!(handle(&inner, r#"{"msg":"no-such-frame"}"#), None);
        // A data-bearing frame right after garbage still routes.
        handle(
            &inner,
            r#"{"msg":"added","collection":"c","id":"d","fields":{}}"#,
        );
        assert!(inner.mirror.view("c").contains("d"));
    }
}
