use crate::domain::{Conversation, DirectMessage};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(crate) struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: i64,
    pub(crate) receiver_id: i64,
    pub(crate) content: String,
    pub(crate) read: bool,
    pub(crate) created_at: OffsetDateTime,
}

impl From<MessageRecord> for DirectMessage {
    fn from(rec: MessageRecord) -> Self {
        Self {
            id: rec.id,
            sender_id: rec.sender_id,
            receiver_id: rec.receiver_id,
            content: rec.content,
            read: rec.read,
            created_at: rec.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ConversationRecord {
    pub(crate) peer_id: i64,
    pub(crate) last_message_at: OffsetDateTime,
    pub(crate) unread_count: i64,
}

impl From<ConversationRecord> for Conversation {
    fn from(rec: ConversationRecord) -> Self {
        Self { peer_id: rec.peer_id, last_message_at: rec.last_message_at, unread_count: rec.unread_count }
    }
}
