// ── Chat client ──
//
// Thin veneer over the protocol engine: every operation here is a named
// server method call or subscription plus reply interpretation. Session
// handling, reconnection, and the collection mirror all stay in
// `bolide-ddp`; this layer decides method names and payload shapes.

use bolide_ddp::{ConnectConfig, DdpClient, DdpError};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::credentials::Credentials;
use crate::error::ChatError;
use crate::model::{LoginSession, PresenceStatus, Room};
use crate::stream::{MessageStream, ROOM_MESSAGES_STREAM};

/// A realtime chat connection.
///
/// Cheap to clone; clones share the one underlying session. Construct
/// with [`ChatClient::new`], then [`connect`](Self::connect) and
/// [`login`](Self::login).
#[derive(Clone)]
pub struct ChatClient {
    ddp: DdpClient,
}

impl ChatClient {
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            ddp: DdpClient::new(config),
        }
    }

    /// The protocol engine underneath, for anything this veneer does not
    /// cover: raw method calls, session events, collection snapshots.
    pub fn ddp(&self) -> &DdpClient {
        &self.ddp
    }

    /// Open the connection and complete the protocol handshake.
    pub async fn connect(&self) -> Result<(), ChatError> {
        self.ddp.connect().await?;
        Ok(())
    }

    /// Close the connection and stop all background work.
    pub async fn disconnect(&self) {
        self.ddp.disconnect().await;
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate this session.
    ///
    /// On success the returned resume token is installed on the engine,
    /// so automatic reconnects re-authenticate before subscriptions are
    /// re-issued -- the session stays logged in across connection drops.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginSession, ChatError> {
        let reply = match self.ddp.call("login", vec![credentials.login_params()]).await {
            Ok(reply) => reply,
            Err(DdpError::Server(e)) => {
                return Err(ChatError::LoginFailed {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let session: LoginSession =
            serde_json::from_value(reply).map_err(|e| ChatError::MalformedReply {
                context: "login reply",
                detail: e.to_string(),
            })?;

        self.ddp
            .set_resume_login(Some(Credentials::Resume {
                token: session.token.clone(),
            }
            .login_params()))
            .await;

        debug!(user_id = %session.user_id, "logged in");
        Ok(session)
    }

    /// End the authenticated session and stop resuming it on reconnect.
    pub async fn logout(&self) -> Result<(), ChatError> {
        self.ddp.call("logout", vec![]).await?;
        self.ddp.set_resume_login(None).await;
        Ok(())
    }

    // ── Messaging ────────────────────────────────────────────────────

    /// Post a message to a room. Returns the client-generated message id,
    /// usable later with [`delete_message`](Self::delete_message).
    pub async fn send_message(&self, room_id: &str, text: &str) -> Result<String, ChatError> {
        let id = Uuid::new_v4().to_string();
        self.ddp
            .call(
                "sendMessage",
                vec![json!({ "_id": id, "rid": room_id, "msg": text })],
            )
            .await?;
        Ok(id)
    }

    /// Delete a message by id.
    pub async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        self.ddp
            .call("deleteMessage", vec![json!({ "_id": message_id })])
            .await?;
        Ok(())
    }

    // ── Rooms ────────────────────────────────────────────────────────

    /// Resolve a room name (or id) to its canonical room id.
    pub async fn room_id(&self, name: &str) -> Result<String, ChatError> {
        let reply = match self.ddp.call("getRoomIdByNameOrId", vec![json!(name)]).await {
            Ok(reply) => reply,
            Err(DdpError::Server(_)) => {
                return Err(ChatError::RoomNotFound {
                    name: name.to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        match reply {
            Value::String(id) => Ok(id),
            Value::Null => Err(ChatError::RoomNotFound {
                name: name.to_owned(),
            }),
            other => Err(ChatError::MalformedReply {
                context: "room id lookup",
                detail: format!("expected a string, got {other}"),
            }),
        }
    }

    /// All rooms the logged-in user is a member of.
    pub async fn rooms(&self) -> Result<Vec<Room>, ChatError> {
        let reply = self.ddp.call("rooms/get", vec![]).await?;
        serde_json::from_value(reply).map_err(|e| ChatError::MalformedReply {
            context: "room listing",
            detail: e.to_string(),
        })
    }

    /// Join a public channel by room id.
    pub async fn join_room(&self, room_id: &str) -> Result<(), ChatError> {
        self.ddp.call("joinRoom", vec![json!(room_id)]).await?;
        Ok(())
    }

    // ── Presence ─────────────────────────────────────────────────────

    /// Set the default presence other users see.
    pub async fn set_presence(&self, status: PresenceStatus) -> Result<(), ChatError> {
        self.ddp
            .call("UserPresence:setDefaultStatus", vec![json!(status.as_str())])
            .await?;
        Ok(())
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Follow a room's live message traffic as a typed stream.
    ///
    /// The stream keeps yielding across reconnects: the underlying
    /// subscription is re-issued automatically, and the feed is attached
    /// before the subscription starts so no early message is missed.
    pub async fn subscribe_room_messages(&self, room_id: &str) -> Result<MessageStream, ChatError> {
        let events = self.ddp.document_events();
        let handle = self
            .ddp
            .subscribe(ROOM_MESSAGES_STREAM, vec![json!(room_id), json!(false)])
            .await?;

        debug!(room_id, "following room messages");
        Ok(MessageStream::new(room_id.to_owned(), handle, events))
    }
}
