//! Async client engine for DDP, the realtime pub/sub + RPC protocol
//! spoken by Meteor-family servers (Rocket.Chat among them).
//!
//! One long-lived WebSocket carries everything: method calls correlated
//! by id, named subscriptions streaming incremental document updates,
//! and heartbeats. This crate owns that connection end to end:
//!
//! - **[`DdpClient`]** -- Central facade managing the full lifecycle:
//!   [`connect()`](DdpClient::connect) performs the protocol handshake,
//!   then a background supervisor drives I/O, heartbeats, and
//!   reconnect-with-backoff. On every reconnect it replays stored login
//!   credentials and re-issues all subscriptions before accepting new
//!   traffic.
//!
//! - **[`call`](DdpClient::call)** / **[`subscribe`](DdpClient::subscribe)** --
//!   Deadline-bounded RPC and subscription primitives. Each in-flight
//!   operation resolves exactly once: by its response frame, its
//!   timeout, or connection loss -- never twice, never silently retried.
//!
//! - **Collection mirror** -- A local replica of server-owned
//!   collections, fed by incremental `added`/`changed`/`removed` frames.
//!   Read it through [`collection()`](DdpClient::collection) snapshots
//!   or react to [`document_events()`](DdpClient::document_events)
//!   without polling.
//!
//! - **[`SessionEvent`]** / **[`ConnectionState`]** -- Broadcast + watch
//!   channels for observing the session lifecycle.

mod call;
pub mod collection;
pub mod config;
mod dispatch;
pub mod error;
pub mod frame;
pub mod session;
pub mod subscription;
mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collection::{CollectionView, Document, DocumentEvent, DocumentEventKind};
pub use config::{ConnectConfig, HeartbeatConfig, ReconnectConfig};
pub use error::DdpError;
pub use frame::{ClientFrame, ServerError, ServerFrame, PROTOCOL_VERSION};
pub use session::{ConnectionState, DdpClient, SessionEvent, SessionInfo};
pub use subscription::SubscriptionHandle;
