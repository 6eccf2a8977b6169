// ── Session engine ──
//
// Top-level lifecycle management for one DDP session: handshake,
// heartbeat, reconnect orchestration, and the public client facade
// composing the call registry, subscription registry, and collection
// mirror.
//
// All socket I/O for a connection happens on one supervisor task. Its
// inner loop is the only reader and the only writer, so outbound frames
// never interleave and inbound frames are dispatched in server order.
// Callers reach the socket exclusively through a per-connection mpsc
// channel that is torn down the moment the connection ends, which is
// what makes "fail fast while not Connected" airtight.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::call::{CallRegistry, CallReply};
use crate::collection::{CollectionMirror, CollectionView, DocumentEvent};
use crate::config::{ConnectConfig, ReconnectConfig};
use crate::dispatch;
use crate::error::DdpError;
use crate::frame::{ClientFrame, ServerError, ServerFrame};
use crate::subscription::{SubRegistry, SubscriptionHandle};
use crate::transport::{self, FrameSink, FrameSource};

const OUTBOUND_CHANNEL_SIZE: usize = 64;
const SESSION_EVENT_CAPACITY: usize = 256;

/// Method replayed with the stored resume payload after a reconnect.
const RESUME_METHOD: &str = "login";

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── SessionEvent ─────────────────────────────────────────────────────

/// Lifecycle notifications broadcast to consumers.
///
/// Document-level changes travel separately, through
/// [`DdpClient::document_events`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Initial handshake completed.
    Connected,
    /// The connection ended; reconnection may follow.
    Disconnected { reason: String },
    /// A reconnection attempt is about to run.
    Reconnecting { attempt: u32 },
    /// Session re-established; credentials replayed and every prior
    /// subscription re-issued.
    Reconnected,
    /// A subscription finished sending its initial data.
    SubscriptionReady { name: String },
    /// The server terminated a ready subscription on its own.
    SubscriptionEnded {
        name: String,
        error: Option<ServerError>,
    },
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session id assigned by the server in its `connected` frame.
    pub session_id: String,
}

// ── DdpClient ────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. One client owns at most one live
/// connection; [`connect`](Self::connect) starts it and a background
/// supervisor keeps it alive through reconnects until
/// [`disconnect`](Self::disconnect).
#[derive(Clone)]
pub struct DdpClient {
    inner: Arc<ClientInner>,
}

impl DdpClient {
    /// Create a client from configuration. Does not connect -- call
    /// [`connect()`](Self::connect) to open the session.
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner::new(config)),
        }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ConnectConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the socket, perform the protocol handshake, and spawn the
    /// supervisor that owns the connection from then on.
    ///
    /// Fails with a connection error if the handshake is rejected or the
    /// combined connect deadline passes. Calling it on a client that is
    /// already connected (or mid-reconnect) is an error.
    pub async fn connect(&self) -> Result<SessionInfo, DdpError> {
        let inner = &self.inner;
        let mut task_slot = inner.task.lock().await;
        if task_slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(DdpError::connection("already connected"));
        }

        inner.set_state(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        *inner.conn_cancel.lock().await = cancel.clone();

        let established = match establish(inner).await {
            Ok(established) => established,
            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        info!(session = %established.session_id, "session established");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        *inner.outbound.lock().await = Some(outbound_tx);
        inner.set_state(ConnectionState::Connected);
        inner.emit(SessionEvent::Connected);

        let info = SessionInfo {
            session_id: established.session_id.clone(),
        };
        *task_slot = Some(tokio::spawn(supervise(
            Arc::clone(inner),
            established,
            outbound_rx,
            cancel,
        )));

        Ok(info)
    }

    /// Tear the session down: close the socket, stop the supervisor, and
    /// fail all in-flight work with a connection error. The client can
    /// connect again afterwards; the subscription registry starts empty.
    pub async fn disconnect(&self) {
        let task = self.inner.task.lock().await.take();
        self.inner.conn_cancel.lock().await.cancel();
        if let Some(task) = task {
            let _ = task.await;
        }
        debug!("disconnected");
    }

    // ── Remote calls ─────────────────────────────────────────────────

    /// Invoke a remote method and await its result, bounded by the
    /// configured default call timeout.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, DdpError> {
        self.call_with_timeout(method, params, self.inner.config.call_timeout)
            .await
    }

    /// Invoke a remote method with an explicit deadline.
    ///
    /// Fails immediately with [`DdpError::NotConnected`] while the
    /// session is anything but Connected: nothing is queued, because
    /// replaying a method that may already have run server-side could
    /// double-apply non-idempotent effects.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, DdpError> {
        self.inner.ensure_connected()?;
        self.inner.call_internal(method, params, timeout).await
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to a server publication and await its `ready`, bounded
    /// by the configured default subscribe timeout.
    ///
    /// Initial documents stream into the collection mirror while this is
    /// pending; `ready` only signals that the initial batch is complete.
    pub async fn subscribe(
        &self,
        name: &str,
        params: Vec<Value>,
    ) -> Result<SubscriptionHandle, DdpError> {
        self.subscribe_with_timeout(name, params, self.inner.config.sub_timeout)
            .await
    }

    /// Subscribe with an explicit deadline for the acknowledgment.
    pub async fn subscribe_with_timeout(
        &self,
        name: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<SubscriptionHandle, DdpError> {
        self.inner.ensure_connected()?;

        let (handle, wire_id, mut rx) = self.inner.subs.register(name, params.clone());
        debug!(name, id = %wire_id, "subscribing");
        if let Err(e) = self
            .inner
            .send_frame(ClientFrame::Sub {
                id: wire_id.clone(),
                name: name.to_owned(),
                params,
            })
            .await
        {
            self.inner.subs.abandon_requested(&wire_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(Ok(()))) => Ok(handle),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(DdpError::Closed),
            Err(_) => {
                if self.inner.subs.abandon_requested(&wire_id) {
                    // Tell the server we gave up; best effort.
                    let _ = self
                        .inner
                        .send_frame(ClientFrame::Unsub { id: wire_id })
                        .await;
                    Err(DdpError::Timeout { elapsed: timeout })
                } else {
                    // The acknowledgment won the race; take its outcome.
                    match (&mut rx).await {
                        Ok(Ok(())) => Ok(handle),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(DdpError::Closed),
                    }
                }
            }
        }
    }

    /// Cancel a subscription.
    ///
    /// Sends `unsub` and waits (in the background) for the confirming
    /// `nosub`; if the server never confirms, the tracking entry is
    /// dropped after the configured grace period anyway. Safe to call
    /// while disconnected -- the subscription is then simply not re-issued
    /// on the next reconnect. Unknown handles are a no-op.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let Some(wire_id) = self.inner.subs.begin_unsubscribe(handle) else {
            return;
        };
        debug!(name = handle.name(), id = %wire_id, "unsubscribing");

        match self
            .inner
            .send_frame(ClientFrame::Unsub { id: wire_id })
            .await
        {
            Ok(()) => {
                let inner = Arc::clone(&self.inner);
                let handle_id = handle.id();
                let name = handle.name().to_owned();
                tokio::spawn(async move {
                    tokio::time::sleep(inner.config.unsub_grace).await;
                    if inner.subs.force_remove(handle_id) {
                        debug!(name, "unsubscribe never acknowledged, dropping entry");
                    }
                });
            }
            Err(_) => {
                // Offline: record the intent locally so the subscription
                // is not re-issued when the session comes back.
                self.inner.subs.force_remove(handle.id());
            }
        }
    }

    // ── Data access ──────────────────────────────────────────────────

    /// Point-in-time snapshot of a mirrored collection. Unknown names
    /// yield an empty view, not an error.
    pub fn collection(&self, name: &str) -> CollectionView {
        self.inner.mirror.view(name)
    }

    /// Subscribe to document add/change/remove notifications.
    pub fn document_events(&self) -> broadcast::Receiver<Arc<DocumentEvent>> {
        self.inner.mirror.subscribe()
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to session lifecycle events.
    pub fn session_events(&self) -> broadcast::Receiver<Arc<SessionEvent>> {
        self.inner.events.subscribe()
    }

    // ── Session resume ───────────────────────────────────────────────

    /// Store (or clear, with `None`) the parameter replayed via a
    /// `login` call after every reconnect, before subscriptions are
    /// re-issued. Typically a resume-token payload.
    pub async fn set_resume_login(&self, params: Option<Value>) {
        *self.inner.resume_payload.lock().await = params;
    }
}

// ── Shared client state ──────────────────────────────────────────────

pub(crate) struct ClientInner {
    pub(crate) config: ConnectConfig,
    state: watch::Sender<ConnectionState>,
    pub(crate) calls: CallRegistry,
    pub(crate) subs: SubRegistry,
    pub(crate) mirror: CollectionMirror,
    events: broadcast::Sender<Arc<SessionEvent>>,
    /// Sender into the live connection's driver; `None` whenever there is
    /// no connection accepting traffic.
    outbound: Mutex<Option<mpsc::Sender<ClientFrame>>>,
    resume_payload: Mutex<Option<Value>>,
    /// Cancellation for the current connection; replaced on each connect.
    conn_cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    pub(crate) fn new(config: ConnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            config,
            state,
            calls: CallRegistry::new(),
            subs: SubRegistry::new(),
            mirror: CollectionMirror::new(),
            events,
            outbound: Mutex::new(None),
            resume_payload: Mutex::new(None),
            conn_cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(Arc::new(event));
    }

    fn set_state(&self, state: ConnectionState) {
        // Must store even with zero receivers (`send` discards the value
        // then); `ensure_connected` reads this channel.
        self.state.send_modify(|current| *current = state);
    }

    fn ensure_connected(&self) -> Result<(), DdpError> {
        if matches!(*self.state.borrow(), ConnectionState::Connected) {
            Ok(())
        } else {
            Err(DdpError::NotConnected)
        }
    }

    /// Hand a frame to the live connection's driver.
    async fn send_frame(&self, frame: ClientFrame) -> Result<(), DdpError> {
        let Some(tx) = self.outbound.lock().await.clone() else {
            return Err(DdpError::NotConnected);
        };
        tx.send(frame).await.map_err(|_| DdpError::NotConnected)
    }

    /// Register, send, and await one method call. Exactly one of the
    /// receive loop (result frame) and this function's timeout arm
    /// resolves the pending entry; the loser of that race defers to the
    /// winner's outcome.
    async fn call_internal(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, DdpError> {
        let (id, mut rx) = self.calls.register(method);
        debug!(method, id, "calling remote method");

        if let Err(e) = self
            .send_frame(ClientFrame::Method {
                id: id.clone(),
                method: method.to_owned(),
                params,
            })
            .await
        {
            self.calls.take(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(DdpError::Closed),
            Err(_) => {
                if self.calls.take(&id) {
                    Err(DdpError::Timeout { elapsed: timeout })
                } else {
                    // A result frame is already committed; await it.
                    match (&mut rx).await {
                        Ok(reply) => reply,
                        Err(_) => Err(DdpError::Closed),
                    }
                }
            }
        }
    }
}

// ── Handshake ────────────────────────────────────────────────────────

struct Established {
    session_id: String,
    sink: FrameSink,
    source: FrameSource,
}

/// Open a socket and run the protocol handshake, all within the
/// configured connect timeout.
async fn establish(inner: &ClientInner) -> Result<Established, DdpError> {
    let deadline = tokio::time::Instant::now() + inner.config.connect_timeout;

    let (mut sink, mut source) =
        transport::connect(&inner.config.endpoint, inner.config.connect_timeout).await?;
    sink.send(&ClientFrame::connect()).await?;

    let session_id = match tokio::time::timeout_at(deadline, read_connected(&mut source)).await {
        Ok(result) => result?,
        Err(_) => return Err(DdpError::connection("handshake timed out")),
    };

    Ok(Established {
        session_id,
        sink,
        source,
    })
}

/// Wait for the server's handshake verdict.
///
/// Some servers emit a non-protocol banner (`{"server_id": ...}`) before
/// the `connected` frame; anything unparseable here is skipped, not fatal.
async fn read_connected(source: &mut FrameSource) -> Result<String, DdpError> {
    loop {
        let Some(text) = source.next_text().await? else {
            return Err(DdpError::connection("connection closed during handshake"));
        };
        match ServerFrame::parse(&text) {
            Ok(ServerFrame::Connected { session }) => return Ok(session),
            Ok(ServerFrame::Failed { version }) => {
                return Err(DdpError::connection(format!(
                    "server rejected the handshake, wants protocol version {version}"
                )));
            }
            Ok(other) => debug!(?other, "unexpected frame during handshake, skipping"),
            Err(e) => debug!(error = %e, "skipping non-protocol message during handshake"),
        }
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

/// How a single connection ended.
enum ConnectionEnd {
    /// Cancelled locally; no reconnect.
    Shutdown,
    /// The server closed cleanly; reconnect without backoff.
    ServerClosed,
}

/// Owns the connection from just after the first handshake until the
/// client shuts down: drives I/O, and on failure reconnects with backoff,
/// replays credentials, and re-issues subscriptions.
async fn supervise(
    inner: Arc<ClientInner>,
    established: Established,
    mut outbound_rx: mpsc::Receiver<ClientFrame>,
    cancel: CancellationToken,
) {
    let Established {
        mut sink,
        mut source,
        ..
    } = established;
    let mut attempt: u32 = 0;
    let mut resuming = false;

    loop {
        let end = run_connection(
            &inner,
            &mut sink,
            &mut source,
            &mut outbound_rx,
            &cancel,
            resuming,
        )
        .await;

        // No more sends reach this connection. In-flight calls and
        // subscribe waiters fail now and are never replayed; only the
        // subscription registry carries state into the next connection.
        *inner.outbound.lock().await = None;
        let reason = match &end {
            Ok(ConnectionEnd::Shutdown) => "client disconnected",
            Ok(ConnectionEnd::ServerClosed) => "connection closed by server",
            Err(_) => "connection lost",
        };
        inner.calls.fail_all(reason);
        inner.subs.on_disconnect(reason);

        match end {
            Ok(ConnectionEnd::Shutdown) => {
                sink.close().await;
                inner.subs.clear();
                inner.set_state(ConnectionState::Disconnected);
                inner.emit(SessionEvent::Disconnected {
                    reason: reason.to_owned(),
                });
                return;
            }
            Ok(ConnectionEnd::ServerClosed) => {
                info!("server closed the connection, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                warn!(error = %e, attempt, "connection failed");
            }
        }
        inner.emit(SessionEvent::Disconnected {
            reason: reason.to_owned(),
        });

        // ── Reconnect with backoff ───────────────────────────────────
        let established = loop {
            if let Some(max) = inner.config.reconnect.max_retries {
                if attempt >= max {
                    error!(max_retries = max, "reconnection limit reached, giving up");
                    inner.subs.clear();
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
            inner.set_state(ConnectionState::Reconnecting { attempt });
            inner.emit(SessionEvent::Reconnecting { attempt });

            let delay = reconnect_delay(attempt, &inner.config.reconnect);
            info!(wait_ms = delay.as_millis() as u64, attempt, "backing off before reconnect");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    inner.subs.clear();
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    inner.subs.clear();
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
                result = establish(&inner) => result,
            };
            match result {
                Ok(established) => break established,
                Err(e) => {
                    warn!(error = %e, attempt, "reconnect attempt failed");
                    attempt += 1;
                }
            }
        };

        info!(session = %established.session_id, "session re-established");
        sink = established.sink;
        source = established.source;
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        outbound_rx = rx;
        *inner.outbound.lock().await = Some(tx);
        attempt = 0;
        // State stays Reconnecting until the resume phase inside
        // run_connection finishes; callers keep failing fast meanwhile.
        resuming = true;
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Drive one live connection: forward outbound frames, dispatch inbound
/// ones, answer pings, and watch traffic for liveness. Runs the resume
/// sequence first when this connection replaces a lost one.
async fn run_connection(
    inner: &Arc<ClientInner>,
    sink: &mut FrameSink,
    source: &mut FrameSource,
    outbound_rx: &mut mpsc::Receiver<ClientFrame>,
    cancel: &CancellationToken,
    resuming: bool,
) -> Result<ConnectionEnd, DdpError> {
    if resuming {
        if !resume_session(inner, sink, source, cancel).await? {
            return Ok(ConnectionEnd::Shutdown);
        }
        inner.set_state(ConnectionState::Connected);
        inner.emit(SessionEvent::Reconnected);
        info!("reconnected");
    }

    let interval = inner.config.heartbeat.interval;
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_inbound = tokio::time::Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ConnectionEnd::Shutdown),
            maybe_frame = outbound_rx.recv() => {
                match maybe_frame {
                    Some(frame) => sink.send(&frame).await?,
                    // Outbound slot dropped: shutdown is in progress.
                    None => return Ok(ConnectionEnd::Shutdown),
                }
            }
            inbound = source.next_text() => {
                match inbound? {
                    Some(text) => {
                        last_inbound = tokio::time::Instant::now();
                        if let Some(reply) = dispatch::handle(inner, &text) {
                            sink.send(&reply).await?;
                        }
                    }
                    None => return Ok(ConnectionEnd::ServerClosed),
                }
            }
            _ = heartbeat.tick() => {
                let silent = last_inbound.elapsed();
                if silent > interval + inner.config.heartbeat.grace {
                    return Err(DdpError::connection(format!(
                        "no traffic for {silent:?}, connection presumed dead"
                    )));
                }
                sink.send(&ClientFrame::Ping { id: None }).await?;
            }
        }
    }
}

// ── Session resume ───────────────────────────────────────────────────

/// Bring a fresh connection back to where the lost one was: replay the
/// stored login payload, then re-issue every surviving subscription.
/// Runs while the public API still reports Reconnecting.
///
/// Returns `Ok(false)` when cancelled mid-resume. A server *rejection*
/// of the replayed login is not an error -- the payload is dropped and
/// the session continues unauthenticated.
async fn resume_session(
    inner: &Arc<ClientInner>,
    sink: &mut FrameSink,
    source: &mut FrameSource,
    cancel: &CancellationToken,
) -> Result<bool, DdpError> {
    let payload = inner.resume_payload.lock().await.clone();
    if let Some(params) = payload {
        debug!("replaying login");
        match inline_call(inner, sink, source, cancel, RESUME_METHOD, vec![params]).await? {
            InlineOutcome::Cancelled => return Ok(false),
            InlineOutcome::Reply(Ok(_)) => debug!("login replay accepted"),
            InlineOutcome::Reply(Err(e)) => {
                warn!(error = %e, "login replay rejected, continuing unauthenticated");
                *inner.resume_payload.lock().await = None;
            }
        }
    }

    let frames = inner.subs.resubscribe_frames();
    if !frames.is_empty() {
        info!(count = frames.len(), "re-issuing subscriptions");
        for frame in &frames {
            sink.send(frame).await?;
        }
    }
    Ok(true)
}

enum InlineOutcome {
    Reply(CallReply),
    Cancelled,
}

/// A method call made directly on the connection halves, for the resume
/// phase where the public call path is deliberately unavailable. Keeps
/// dispatching inbound traffic while waiting so early pushed documents
/// and pings are not stalled behind the login.
async fn inline_call(
    inner: &Arc<ClientInner>,
    sink: &mut FrameSink,
    source: &mut FrameSource,
    cancel: &CancellationToken,
    method: &str,
    params: Vec<Value>,
) -> Result<InlineOutcome, DdpError> {
    let (id, mut rx) = inner.calls.register(method);
    sink.send(&ClientFrame::Method {
        id: id.clone(),
        method: method.to_owned(),
        params,
    })
    .await?;

    let deadline = tokio::time::Instant::now() + inner.config.call_timeout;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                inner.calls.take(&id);
                return Ok(InlineOutcome::Cancelled);
            }
            reply = &mut rx => {
                return Ok(InlineOutcome::Reply(reply.map_err(|_| DdpError::Closed)?));
            }
            _ = tokio::time::sleep_until(deadline) => {
                inner.calls.take(&id);
                return Err(DdpError::connection(format!("no reply to {method} during resume")));
            }
            inbound = source.next_text() => {
                match inbound? {
                    Some(text) => {
                        if let Some(reply) = dispatch::handle(inner, &text) {
                            sink.send(&reply).await?;
                        }
                    }
                    None => return Err(DdpError::connection("connection closed during resume")),
                }
            }
        }
    }
}

// ── Reconnect pacing ─────────────────────────────────────────────────

/// Delay before reconnect attempt `attempt`: doubled from
/// `initial_delay` until `max_delay`, then spread by +-25% so clients
/// that lost the same server do not all come back in step.
///
/// The spread is a sine over the attempt index rather than an RNG:
/// enough to de-phase a fleet, and reproducible when debugging.
fn reconnect_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let doubled = config
        .initial_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let capped = doubled.min(config.max_delay);

    let spread = 0.25 * (f64::from(attempt) * 7.3).sin();
    capped.mul_f64(1.0 + spread)
}

// ── Tests ────────────────────────────────────────────────────────────
