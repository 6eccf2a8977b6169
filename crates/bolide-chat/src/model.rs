// ── Chat domain types ──
//
// Wire-faithful models for the documents the server ships: messages,
// rooms, login replies. Field names follow the server's JSON (`_id`,
// `rid`, `msg`, ...) with serde renames onto Rust-shaped names.
// Timestamps arrive in EJSON form, `{"$date": <ms since epoch>}`.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ── EJSON timestamps ─────────────────────────────────────────────────

/// Serde adapter for optional EJSON `$date` fields. `null` and a missing
/// key both map to `None`.
pub(crate) mod ejson_date_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        #[serde(rename = "$date")]
        millis: i64,
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|v| Wire {
                millis: v.timestamp_millis(),
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let wire = Option::<Wire>::deserialize(deserializer)?;
        wire.map(|w| {
            DateTime::from_timestamp_millis(w.millis)
                .ok_or_else(|| serde::de::Error::custom("$date out of range"))
        })
        .transpose()
    }
}

// ── Messages ─────────────────────────────────────────────────────────

/// A chat message as published on a room's message stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,

    /// The room this message belongs to.
    #[serde(rename = "rid")]
    pub room_id: String,

    /// Message body. Empty for attachment-only and some system messages.
    #[serde(rename = "msg", default)]
    pub text: String,

    /// When the message was sent.
    #[serde(rename = "ts", default, with = "ejson_date_opt")]
    pub sent_at: Option<DateTime<Utc>>,

    /// Who sent it.
    #[serde(rename = "u")]
    pub sender: UserRef,

    /// System-message type (`"uj"` user joined, `"ul"` user left, ...).
    /// `None` for ordinary chat messages.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub system_kind: Option<String>,

    #[serde(
        rename = "_updatedAt",
        default,
        with = "ejson_date_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// True for ordinary user-authored chat messages, false for system
    /// messages like join/leave notices.
    pub fn is_chat(&self) -> bool {
        self.system_kind.is_none()
    }
}

/// Minimal reference to a user, as embedded in messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name, when the server is configured to send it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ── Rooms ────────────────────────────────────────────────────────────

/// One room the logged-in user is a member of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: String,

    /// Channel name; direct-message rooms have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "t")]
    pub kind: RoomKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(rename = "ro", default)]
    pub read_only: bool,
}

/// Room type, from the wire's one-letter `t` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomKind {
    #[serde(rename = "c")]
    Channel,
    #[serde(rename = "p")]
    Private,
    #[serde(rename = "d")]
    Direct,
    #[serde(rename = "l")]
    Livechat,
    /// A type this crate does not know about; kept so one exotic room
    /// cannot fail a whole `rooms` listing.
    #[serde(other)]
    Unknown,
}

// ── Sessions & presence ──────────────────────────────────────────────

/// A successful login: who you are and the token that can resume this
/// session later (also replayed automatically after reconnects).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSession {
    #[serde(rename = "id")]
    pub user_id: String,
    pub token: SecretString,
    #[serde(rename = "tokenExpires", default, with = "ejson_date_opt")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Default presence advertised to other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Away,
    Busy,
    Offline,
}

impl PresenceStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn message_parses_from_wire_shape() {
        let message: Message = serde_json::from_value(json!({
            "_id": "m1",
            "rid": "GENERAL",
            "msg": "hello there",
            "ts": { "$date": 1_419_954_042_347_i64 },
            "u": { "_id": "u1", "username": "ada" },
            "_updatedAt": { "$date": 1_419_954_042_844_i64 }
        }))
        .unwrap();

        assert_eq!(message.id, "m1");
        assert_eq!(message.room_id, "GENERAL");
        assert_eq!(message.text, "hello there");
        assert_eq!(message.sender.username.as_deref(), Some("ada"));
        assert_eq!(message.sent_at.unwrap().timestamp_millis(), 1_419_954_042_347);
        assert!(message.is_chat());
    }

    #[test]
    fn system_message_is_not_chat() {
        let message: Message = serde_json::from_value(json!({
            "_id": "m2",
            "rid": "GENERAL",
            "t": "uj",
            "u": { "_id": "u2", "username": "bob" }
        }))
        .unwrap();

        assert!(!message.is_chat());
        assert_eq!(message.text, "");
        assert!(message.sent_at.is_none());
    }

    #[test]
    fn message_serializes_timestamps_as_ejson() {
        let message: Message = serde_json::from_value(json!({
            "_id": "m1",
            "rid": "r",
            "msg": "x",
            "ts": { "$date": 1_000_i64 },
            "u": { "_id": "u1" }
        }))
        .unwrap();

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["ts"], json!({ "$date": 1000 }));
    }

    #[test]
    fn room_kinds_cover_the_wire_codes() {
        let rooms: Vec<Room> = serde_json::from_value(json!([
            { "_id": "r1", "name": "general", "t": "c" },
            { "_id": "r2", "t": "d" },
            { "_id": "r3", "name": "ops", "t": "p", "ro": true },
            { "_id": "r4", "t": "z9" }
        ]))
        .unwrap();

        assert_eq!(rooms[0].kind, RoomKind::Channel);
        assert_eq!(rooms[1].kind, RoomKind::Direct);
        assert!(rooms[1].name.is_none());
        assert_eq!(rooms[2].kind, RoomKind::Private);
        assert!(rooms[2].read_only);
        assert_eq!(rooms[3].kind, RoomKind::Unknown);
    }

    #[test]
    fn login_session_parses_and_redacts_the_token() {
        let session: LoginSession = serde_json::from_value(json!({
            "id": "u1",
            "token": "tok-1",
            "tokenExpires": { "$date": 2_000_000_000_000_i64 },
            "type": "password"
        }))
        .unwrap();

        assert_eq!(session.user_id, "u1");
        assert!(session.expires_at.is_some());
        assert!(!format!("{session:?}").contains("tok-1"));
    }
}
