//! Rocket.Chat realtime client layered on the `bolide-ddp` engine.
//!
//! The engine speaks the wire protocol -- sessions, method calls,
//! subscriptions, the collection mirror. This crate adds chat semantics
//! on top:
//!
//! - **[`ChatClient`]** -- The facade: [`connect()`](ChatClient::connect),
//!   [`login()`](ChatClient::login), then messaging, rooms, and presence.
//!   Logins install a resume token on the engine, so reconnects come back
//!   authenticated.
//!
//! - **[`Credentials`]** -- Every login shape the server accepts
//!   (password with sha-256 digest, LDAP, resume token), serialized to
//!   the `login` method's wire payload.
//!
//! - **[`MessageStream`]** -- A room's live traffic as a typed
//!   [`Stream`](futures_core::Stream) of [`Message`] values, decoded from
//!   the server's streamer frames.
//!
//! - **Domain model** ([`model`]) -- Wire-faithful [`Message`], [`Room`],
//!   and [`LoginSession`] types, with EJSON `$date` timestamps mapped to
//!   [`chrono`] types.

pub mod chat;
pub mod credentials;
pub mod error;
pub mod model;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use chat::ChatClient;
pub use credentials::{Credentials, Identity};
pub use error::ChatError;
pub use model::{LoginSession, Message, PresenceStatus, Room, RoomKind, UserRef};
pub use stream::MessageStream;

// Engine types callers interact with at this level.
pub use bolide_ddp::{ConnectConfig, ConnectionState, DdpClient, DdpError, SessionEvent};
