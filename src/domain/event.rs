use crate::domain::message::DirectMessage;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Frames a client may send over the relay socket, discriminated by a `type`
/// tag on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Register { user_id: i64 },
    JoinRoom { room: String },
    SendMessage { room: String, content: String },
    DirectMessage { receiver_id: i64, content: String },
}

/// Frames the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewMessage {
        message: DirectMessage,
    },
    RoomMessage {
        room: String,
        sender_id: i64,
        content: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

/// Close codes treated as deliberate: 1000 (normal closure) and 1001 (going
/// away). Everything else is abnormal and triggers reconnection.
#[must_use]
pub const fn is_clean_close(code: u16) -> bool {
    matches!(code, 1000 | 1001)
}
