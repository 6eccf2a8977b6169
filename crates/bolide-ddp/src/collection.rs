// ── Local collection mirror ──
//
// Client-side replica of server-owned collections, fed exclusively by
// inbound added/changed/removed frames. Storage is DashMap-backed (the
// receive loop writes while callers read concurrently); consumers get
// point-in-time snapshots plus a broadcast stream of document events so
// nothing has to poll.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::trace;

const DOCUMENT_EVENT_CAPACITY: usize = 256;

// ── Documents ────────────────────────────────────────────────────────

/// One document in a mirrored collection: its id plus a free-form field
/// map. Owned by the mirror; callers only ever see clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// A single field value, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEventKind {
    Added,
    Changed,
    Removed,
}

/// A document operation forwarded from the receive loop.
///
/// Every inbound added/changed/removed is forwarded here once the mirror
/// has applied it. For `Changed` the document carries the post-merge
/// state -- or, when the id was never mirrored, the operation's fields as
/// received: streamer-style pseudo-collections deliver everything as
/// `changed` under a constant id that never gets an `added`. For
/// `Removed` it carries the last mirrored state, or just the id when
/// nothing was mirrored.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    pub collection: String,
    pub kind: DocumentEventKind,
    pub document: Document,
}

// ── Mirror ───────────────────────────────────────────────────────────

/// The per-collection document store.
///
/// Mutated only by applying inbound operations, never by caller writes.
/// For any collection it reflects exactly the cumulative effect of the
/// operations received since the last full resubscription -- eventually,
/// not instantly, consistent with the server during reconnect windows.
pub(crate) struct CollectionMirror {
    collections: DashMap<String, DashMap<String, Document>>,
    events: broadcast::Sender<Arc<DocumentEvent>>,
}

impl CollectionMirror {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(DOCUMENT_EVENT_CAPACITY);
        Self {
            collections: DashMap::new(),
            events,
        }
    }

    /// New broadcast receiver for document events. Slow consumers observe
    /// `Lagged` rather than blocking the receive loop.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<DocumentEvent>> {
        self.events.subscribe()
    }

    /// Point-in-time snapshot of a collection. Unknown names yield an
    /// empty view, not an error.
    pub(crate) fn view(&self, name: &str) -> CollectionView {
        let documents: HashMap<String, Document> = self
            .collections
            .get(name)
            .map(|coll| {
                coll.iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default();

        CollectionView {
            name: name.to_owned(),
            documents,
        }
    }

    // ── Inbound operations ───────────────────────────────────────────

    /// Insert a full document. An existing id is overwritten -- servers
    /// re-send initial data after resubscription, so `added` must be
    /// idempotent.
    pub(crate) fn apply_added(&self, collection: String, id: String, fields: Map<String, Value>) {
        let document = Document {
            id: id.clone(),
            fields,
        };

        self.collections
            .entry(collection.clone())
            .or_default()
            .insert(id, document.clone());

        self.notify(collection, DocumentEventKind::Added, document);
    }

    /// Merge `fields` into an existing document and delete every field in
    /// `cleared`. The mirror leaves unknown documents alone (deltas can
    /// outrun the frame that would have created them), but the operation
    /// is still forwarded to observers: streamer pseudo-collections never
    /// send an `added` at all.
    pub(crate) fn apply_changed(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        cleared: &[String],
    ) {
        let document = match self.collections.get(collection) {
            None => {
                trace!(collection, id, "changed for a document the mirror never saw");
                Document {
                    id: id.to_owned(),
                    fields,
                }
            }
            Some(coll) => match coll.get_mut(id) {
                None => {
                    trace!(collection, id, "changed for a document the mirror never saw");
                    Document {
                        id: id.to_owned(),
                        fields,
                    }
                }
                Some(mut document) => {
                    for (field, value) in fields {
                        document.fields.insert(field, value);
                    }
                    for field in cleared {
                        document.fields.remove(field.as_str());
                    }
                    document.clone()
                }
            },
        };

        self.notify(collection.to_owned(), DocumentEventKind::Changed, document);
    }

    /// Delete a document if present. The notification goes out either
    /// way; a removal for an untracked id carries just the id.
    pub(crate) fn apply_removed(&self, collection: &str, id: &str) {
        let removed = self
            .collections
            .get(collection)
            .and_then(|coll| coll.remove(id))
            .map(|(_, document)| document);

        let document = match removed {
            Some(document) => document,
            None => {
                trace!(collection, id, "removed for a document the mirror never saw");
                Document {
                    id: id.to_owned(),
                    fields: Map::new(),
                }
            }
        };

        self.notify(collection.to_owned(), DocumentEventKind::Removed, document);
    }

    /// Broadcast after all map guards are released. Send errors just mean
    /// nobody is listening right now.
    fn notify(&self, collection: String, kind: DocumentEventKind, document: Document) {
        let _ = self.events.send(Arc::new(DocumentEvent {
            collection,
            kind,
            document,
        }));
    }
}

// ── Read-only views ──────────────────────────────────────────────────

/// A point-in-time snapshot of one collection.
///
/// Detached from the mirror: later inbound operations do not show up
/// here. Take a fresh view to observe them.
#[derive(Debug, Clone)]
pub struct CollectionView {
    name: String,
    documents: HashMap<String, Document>,
}

impl CollectionView {
    /// The collection name this view was taken from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate the documents in no particular order.
    pub fn iter(&self) -> std::collections::hash_map::Values<'_, String, Document> {
        self.documents.values()
    }
}

impl<'a> IntoIterator for &'a CollectionView {
    type Item = &'a Document;
    type IntoIter = std::collections::hash_map::Values<'a, String, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn added_then_read_through_view() {
        let mirror = CollectionMirror::new();
        mirror.apply_added(
            "messages".into(),
            "m1".into(),
            fields(json!({ "text": "hi" })),
        );

        let view = mirror.view("messages");
        assert_eq!(view.len(), 1);
        assert_eq!(view.get("m1").unwrap().get("text"), Some(&json!("hi")));
    }

    #[test]
    fn added_twice_overwrites_the_document() {
        let mirror = CollectionMirror::new();
        mirror.apply_added("users".into(), "u1".into(), fields(json!({ "name": "a" })));
        mirror.apply_added(
            "users".into(),
            "u1".into(),
            fields(json!({ "name": "b", "status": "online" })),
        );

        let view = mirror.view("users");
        assert_eq!(view.len(), 1);
        let doc = view.get("u1").unwrap();
        assert_eq!(doc.get("name"), Some(&json!("b")));
        assert_eq!(doc.get("status"), Some(&json!("online")));
    }

    #[test]
    fn changed_merges_and_clears_fields() {
        let mirror = CollectionMirror::new();
        mirror.apply_added(
            "users".into(),
            "u1".into(),
            fields(json!({ "name": "a", "status": "online", "statusText": "hey" })),
        );
        mirror.apply_changed(
            "users",
            "u1",
            fields(json!({ "status": "away" })),
            &["statusText".into()],
        );

        let view = mirror.view("users");
        let doc = view.get("u1").unwrap();
        assert_eq!(doc.get("name"), Some(&json!("a")));
        assert_eq!(doc.get("status"), Some(&json!("away")));
        assert_eq!(doc.get("statusText"), None);
    }

    #[test]
    fn changed_for_unknown_document_creates_nothing_but_is_forwarded() {
        let mirror = CollectionMirror::new();
        let mut events = mirror.subscribe();

        mirror.apply_changed("users", "ghost", fields(json!({ "x": 1 })), &[]);

        assert!(mirror.view("users").is_empty());
        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, DocumentEventKind::Changed);
        assert_eq!(event.document.id, "ghost");
        assert_eq!(event.document.get("x"), Some(&json!(1)));
    }

    #[test]
    fn stream_collections_flow_through_without_mirroring() {
        // Streamer-style pseudo-collections send every event as `changed`
        // under a constant id; nothing accumulates locally but observers
        // still see each payload.
        let mirror = CollectionMirror::new();
        let mut events = mirror.subscribe();

        mirror.apply_changed(
            "stream-room-messages",
            "id",
            fields(json!({ "eventName": "GENERAL", "args": [{ "msg": "hi" }] })),
            &[],
        );

        assert!(mirror.view("stream-room-messages").is_empty());
        let event = events.try_recv().unwrap();
        assert_eq!(event.document.get("eventName"), Some(&json!("GENERAL")));
    }

    #[test]
    fn removed_deletes_and_reports_last_state() {
        let mirror = CollectionMirror::new();
        mirror.apply_added(
            "messages".into(),
            "m1".into(),
            fields(json!({ "text": "bye" })),
        );
        let mut events = mirror.subscribe();

        mirror.apply_removed("messages", "m1");

        assert!(mirror.view("messages").is_empty());
        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, DocumentEventKind::Removed);
        assert_eq!(event.document.get("text"), Some(&json!("bye")));
    }

    #[test]
    fn removed_for_unknown_document_is_forwarded_bare() {
        let mirror = CollectionMirror::new();
        let mut events = mirror.subscribe();

        mirror.apply_removed("messages", "ghost");

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, DocumentEventKind::Removed);
        assert_eq!(event.document.id, "ghost");
        assert!(event.document.fields.is_empty());
    }

    #[test]
    fn absent_collection_is_an_empty_view() {
        let mirror = CollectionMirror::new();
        let view = mirror.view("nothing-here");
        assert!(view.is_empty());
        assert_eq!(view.name(), "nothing-here");
    }

    #[test]
    fn views_are_point_in_time() {
        let mirror = CollectionMirror::new();
        mirror.apply_added("rooms".into(), "r1".into(), fields(json!({ "n": 1 })));

        let before = mirror.view("rooms");
        mirror.apply_added("rooms".into(), "r2".into(), fields(json!({ "n": 2 })));

        assert_eq!(before.len(), 1);
        assert_eq!(mirror.view("rooms").len(), 2);
    }

    #[test]
    fn events_arrive_in_application_order() {
        let mirror = CollectionMirror::new();
        let mut events = mirror.subscribe();

        mirror.apply_added("c".into(), "d1".into(), fields(json!({ "v": 1 })));
        mirror.apply_changed("c", "d1", fields(json!({ "v": 2 })), &[]);
        mirror.apply_removed("c", "d1");

        let kinds: Vec<DocumentEventKind> = (0..3)
            .map(|_| events.try_recv().unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                DocumentEventKind::Added,
                DocumentEventKind::Changed,
                DocumentEventKind::Removed
            ]
        );
    }
}
