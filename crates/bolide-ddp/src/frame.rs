//! DDP wire frames.
//!
//! Every message exchanged over the connection is one frame: a JSON object
//! with a `msg` tag naming its kind plus kind-specific fields. The two
//! directions use distinct closed enums so the dispatcher can match
//! exhaustively; anything outside the known set fails to parse and is
//! dropped at the boundary instead of being poked at field-by-field.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The DDP protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "1";

// ── Client → server ──────────────────────────────────────────────────

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Open the DDP session. First frame after the socket is up.
    Connect {
        version: String,
        support: Vec<String>,
    },

    /// Invoke a remote method. `id` is echoed back in the `result` frame.
    Method {
        id: String,
        method: String,
        params: Vec<Value>,
    },

    /// Start a subscription. `id` is echoed back in `ready` / `nosub`.
    Sub {
        id: String,
        name: String,
        params: Vec<Value>,
    },

    /// Stop a subscription previously started with `sub`.
    Unsub { id: String },

    /// Heartbeat probe. The `id`, if present, is echoed in the `pong`.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Heartbeat reply to a server `ping`.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ClientFrame {
    /// The session-opening handshake frame for the protocol version we speak.
    pub fn connect() -> Self {
        Self::Connect {
            version: PROTOCOL_VERSION.to_owned(),
            support: vec![PROTOCOL_VERSION.to_owned()],
        }
    }
}

// ── Server → client ──────────────────────────────────────────────────

/// Frames received from the server.
///
/// Parsed at the dispatch boundary with [`ServerFrame::parse`]; a frame
/// whose `msg` is outside this set (or whose fields are malformed) is a
/// parse error, never a partially-understood value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Handshake accepted; carries the server-assigned session id.
    Connected { session: String },

    /// Handshake rejected; `version` is the newest version the server speaks.
    Failed { version: String },

    /// Completion of a `method` call. Exactly one of `result` / `error`
    /// is meaningful; a missing `result` on success means the method
    /// returned nothing.
    Result {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ServerError>,
    },

    /// The named subscriptions have finished sending their initial data.
    Ready { subs: Vec<String> },

    /// A subscription ended: either an error reply to `sub`, or the
    /// acknowledgement of `unsub` (then without an error).
    Nosub {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ServerError>,
    },

    /// A document appeared in a collection.
    Added {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        fields: Map<String, Value>,
    },

    /// Fields of an existing document changed. `fields` holds new values,
    /// `cleared` lists fields that no longer exist.
    Changed {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        fields: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        cleared: Vec<String>,
    },

    /// A document left a collection.
    Removed { collection: String, id: String },

    /// Server-initiated heartbeat probe; must be answered with `pong`.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Reply to a client `ping`.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ServerFrame {
    /// Parse one inbound text message into a frame.
    ///
    /// Servers also emit non-frame banners (e.g. `{"server_id": "0"}`
    /// before the handshake); those fail here and are the caller's cue to
    /// drop the message.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Structured server errors ─────────────────────────────────────────

/// The error payload carried by `result` and `nosub` frames.
///
/// `error` is the machine code (a string like `"error-invalid-user"` or a
/// bare number, depending on the server), `reason` / `message` are the
/// human-readable forms, and `details` is an optional free-form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub error: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(
        rename = "errorType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServerError {
    /// The machine error code, when the server sent it as a string.
    pub fn code(&self) -> Option<&str> {
        self.error.as_str()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.reason {
            write!(f, "{reason}")
        } else if let Some(message) = &self.message {
            write!(f, "{message}")
        } else {
            write!(f, "server error {}", self.error)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
