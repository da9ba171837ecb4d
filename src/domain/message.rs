use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A message between exactly two distinct participants. Content is immutable
/// once created; only the read flag may change, and only from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: Uuid,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DirectMessage {
    /// Builds an unpersisted message for relay push. The id is opaque to the
    /// relay; durable identity comes from the REST persistence path.
    #[must_use]
    pub fn ephemeral(sender_id: i64, receiver_id: i64, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content,
            read: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub const fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The other participant from `user_id`'s point of view, if `user_id` is a
    /// participant at all.
    #[must_use]
    pub const fn peer_of(&self, user_id: i64) -> Option<i64> {
        if self.sender_id == user_id {
            Some(self.receiver_id)
        } else if self.receiver_id == user_id {
            Some(self.sender_id)
        } else {
            None
        }
    }
}

/// A derived view over [`DirectMessage`], never authored directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub peer_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_message_at: OffsetDateTime,
    pub unread_count: i64,
}
