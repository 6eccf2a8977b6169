// ── Runtime connection configuration ──
//
// These types describe *how* to reach and maintain a DDP session: the
// endpoint, handshake/call deadlines, heartbeat cadence, and reconnect
// backoff. The caller constructs a `ConnectConfig` and hands it in; this
// crate never reads config files.

use std::time::Duration;

use url::Url;

/// Heartbeat cadence for detecting silently-dead connections.
///
/// A `ping` goes out every `interval`. If nothing at all arrives from the
/// server for `interval + grace`, the connection is declared dead and the
/// reconnect path runs. Any inbound frame counts as proof of life, not
/// just `pong` -- a server busy pushing data is clearly alive.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between outbound pings. Default: 15s.
    pub interval: Duration,

    /// Extra allowance beyond `interval` before the peer is considered
    /// gone. Default: 10s.
    pub grace: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            grace: Duration::from_secs(10),
        }
    }
}

/// Exponential backoff configuration for session reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up and settling in
    /// Disconnected. `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Configuration for one DDP client.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/websocket`.
    pub endpoint: Url,

    /// Deadline for the combined socket connect + DDP handshake.
    pub connect_timeout: Duration,

    /// Default deadline for `call` when none is given per call.
    pub call_timeout: Duration,

    /// Default deadline for `subscribe` acknowledgement.
    pub sub_timeout: Duration,

    /// How long to wait for the server to acknowledge an `unsub` before
    /// dropping the tracking entry anyway (bounds registry growth when a
    /// server never answers).
    pub unsub_grace: Duration,

    /// Heartbeat cadence while Connected.
    pub heartbeat: HeartbeatConfig,

    /// Backoff policy between reconnection attempts.
    pub reconnect: ReconnectConfig,
}

impl ConnectConfig {
    /// A config for `endpoint` with default tuning.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            sub_timeout: Duration::from_secs(30),
            unsub_grace: Duration::from_secs(10),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}
