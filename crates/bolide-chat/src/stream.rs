// ── Typed message streams ──
//
// Adapter from the engine's document-event feed to chat messages. The
// server publishes room traffic on the `stream-room-messages` pseudo-
// collection: every event is a `changed` under a constant document id,
// with the actual messages inside `fields.args`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bolide_ddp::{DocumentEvent, DocumentEventKind, SubscriptionHandle};
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use crate::model::Message;

/// Publication name for a room's live message traffic.
pub(crate) const ROOM_MESSAGES_STREAM: &str = "stream-room-messages";

/// Live feed of chat messages for one room.
///
/// Messages for other rooms and non-message traffic are filtered out.
/// Dropping the stream does not cancel the underlying subscription; keep
/// the handle (see [`MessageStream::handle`]) and pass it to
/// `DdpClient::unsubscribe` for that.
pub struct MessageStream {
    room_id: String,
    handle: SubscriptionHandle,
    events: BroadcastStream<Arc<DocumentEvent>>,
    /// One stream frame can carry several messages; overflow waits here.
    buffered: VecDeque<Message>,
}

impl MessageStream {
    pub(crate) fn new(
        room_id: String,
        handle: SubscriptionHandle,
        events: broadcast::Receiver<Arc<DocumentEvent>>,
    ) -> Self {
        Self {
            room_id,
            handle,
            events: BroadcastStream::new(events),
            buffered: VecDeque::new(),
        }
    }

    /// The room this stream follows.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Handle of the underlying message-stream subscription.
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Next message, or `None` once the engine has shut down for good.
    pub async fn next_message(&mut self) -> Option<Message> {
        self.next().await
    }

    fn ingest(&mut self, event: &DocumentEvent) {
        for message in extract_messages(&self.room_id, event) {
            self.buffered.push_back(message);
        }
    }
}

/// The messages carried by one document event, if it belongs to `room_id`'s
/// stream. Anything else -- other rooms, ordinary collections, entries that
/// do not parse -- yields nothing.
fn extract_messages(room_id: &str, event: &DocumentEvent) -> Vec<Message> {
    if event.kind != DocumentEventKind::Changed || event.collection != ROOM_MESSAGES_STREAM {
        return Vec::new();
    }
    if event.document.get("eventName").and_then(Value::as_str) != Some(room_id) {
        return Vec::new();
    }
    let Some(args) = event.document.get("args").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut messages = Vec::with_capacity(args.len());
    for arg in args {
        match serde_json::from_value::<Message>(arg.clone()) {
            Ok(message) => messages.push(message),
            Err(e) => debug!(error = %e, "skipping unparseable stream message"),
        }
    }
    messages
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Poll::Ready(Some(message));
            }
            // BroadcastStream is Unpin, so projecting through a plain
            // mutable reference is fine.
            match Pin::new(&mut self.events).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => self.ingest(&event),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    warn!(missed, room_id = %self.room_id, "message stream lagged, events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
