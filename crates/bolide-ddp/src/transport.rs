// ── WebSocket transport ──
//
// Owns the raw socket and nothing else: no protocol state, no routing.
// The connection is split into a sink and a source so the driver task can
// write in one select! arm while polling reads in another. Exactly one
// task holds each half, which is what makes every send atomic and every
// inbound frame arrive in server order.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::DdpError;
use crate::frame::ClientFrame;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the socket, bounded by `timeout`. TLS is negotiated when the URL
/// scheme asks for it (`wss`).
pub(crate) async fn connect(
    endpoint: &Url,
    timeout: Duration,
) -> Result<(FrameSink, FrameSource), DdpError> {
    debug!(url = %endpoint, "opening websocket");

    let uri: tungstenite::http::Uri = endpoint
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| DdpError::connection(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri);

    let (socket, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| DdpError::connection("websocket connect timed out"))?
        .map_err(|e| DdpError::connection(e.to_string()))?;

    let (write, read) = socket.split();
    Ok((FrameSink { write }, FrameSource { read }))
}

// ── Outbound half ────────────────────────────────────────────────────

pub(crate) struct FrameSink {
    write: futures_util::stream::SplitSink<Socket, Message>,
}

impl FrameSink {
    /// Serialize one protocol frame and send it as a single text message.
    pub(crate) async fn send(&mut self, frame: &ClientFrame) -> Result<(), DdpError> {
        let json = serde_json::to_string(frame).map_err(|e| DdpError::Protocol {
            detail: format!("frame encode failed: {e}"),
        })?;
        self.write
            .send(Message::text(json))
            .await
            .map_err(|e| DdpError::connection(e.to_string()))
    }

    /// Start the websocket close handshake. Best effort; the peer may
    /// already be gone.
    pub(crate) async fn close(&mut self) {
        let _ = self.write.close().await;
    }
}

// ── Inbound half ─────────────────────────────────────────────────────

pub(crate) struct FrameSource {
    read: futures_util::stream::SplitStream<Socket>,
}

impl FrameSource {
    /// Next text payload from the socket.
    ///
    /// `Ok(None)` means the connection ended cleanly (close frame or EOF);
    /// `Err` means it broke. Websocket control frames are handled here --
    /// tungstenite answers ping with pong on its own -- and binary messages
    /// are dropped, since the protocol is text-only.
    pub(crate) async fn next_text(&mut self) -> Result<Option<Utf8Bytes>, DdpError> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(_))) => {
                    trace!("websocket ping");
                }
                Some(Ok(Message::Close(close))) => {
                    if let Some(ref frame) = close {
                        debug!(code = %frame.code, reason = %frame.reason, "websocket close frame");
                    } else {
                        debug!("websocket close frame (no payload)");
                    }
                    return Ok(None);
                }
                Some(Ok(Message::Binary(payload))) => {
                    debug!(len = payload.len(), "ignoring binary websocket message");
                }
                Some(Ok(_)) => {
                    // Pong, raw Frame -- nothing to do
                }
                Some(Err(e)) => return Err(DdpError::connection(e.to_string())),
                None => {
                    debug!("websocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}
