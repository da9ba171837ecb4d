use crate::domain::{Conversation, DirectMessage};
use crate::error::Result;
use crate::storage::MessageStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory message store for tests and single-process development. Shares
/// the `MessageStore` seam with the Postgres store so the rest of the stack is
/// unaware of which one it is talking to.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<DirectMessage>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, sender_id: i64, receiver_id: i64, content: String) -> Result<DirectMessage> {
        let message = DirectMessage::ephemeral(sender_id, receiver_id, content);
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn conversation(&self, user_id: i64, peer_id: i64) -> Result<Vec<DirectMessage>> {
        let messages = self.messages.read().await;
        let mut result: Vec<DirectMessage> = messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.receiver_id == peer_id)
                    || (m.sender_id == peer_id && m.receiver_id == user_id)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn mark_read(&self, receiver_id: i64, sender_id: i64) -> Result<u64> {
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for message in messages.iter_mut() {
            if message.receiver_id == receiver_id && message.sender_id == sender_id && !message.read {
                message.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let messages = self.messages.read().await;
        let mut by_peer: HashMap<i64, Conversation> = HashMap::new();

        for message in messages.iter() {
            let Some(peer_id) = message.peer_of(user_id) else { continue };
            let unread = i64::from(message.receiver_id == user_id && !message.read);

            by_peer
                .entry(peer_id)
                .and_modify(|c| {
                    c.unread_count += unread;
                    if message.created_at > c.last_message_at {
                        c.last_message_at = message.created_at;
                    }
                })
                .or_insert_with(|| Conversation {
                    peer_id,
                    last_message_at: message.created_at,
                    unread_count: unread,
                });
        }

        let mut result: Vec<Conversation> = by_peer.into_values().collect();
        result.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(result)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_read_is_monotonic() {
        let store = MemoryStore::new();
        store.create(1, 2, "a".into()).await.unwrap();
        store.create(1, 2, "b".into()).await.unwrap();

        let first = store.mark_read(2, 1).await.unwrap();
        assert_eq!(first, 2);

        // Already read; nothing flips back or counts again.
        let second = store.mark_read(2, 1).await.unwrap();
        assert_eq!(second, 0);

        let messages = store.conversation(2, 1).await.unwrap();
        assert!(messages.iter().all(|m| m.read));
    }

    #[tokio::test]
    async fn conversations_derive_unread_counts() {
        let store = MemoryStore::new();
        store.create(1, 2, "to two".into()).await.unwrap();
        store.create(1, 2, "again".into()).await.unwrap();
        store.create(2, 1, "reply".into()).await.unwrap();
        store.create(3, 2, "other peer".into()).await.unwrap();

        let convos = store.conversations(2).await.unwrap();
        assert_eq!(convos.len(), 2);

        let with_one = convos.iter().find(|c| c.peer_id == 1).unwrap();
        assert_eq!(with_one.unread_count, 2);

        let with_three = convos.iter().find(|c| c.peer_id == 3).unwrap();
        assert_eq!(with_three.unread_count, 1);
    }

    #[tokio::test]
    async fn conversation_is_oldest_first() {
        let store = MemoryStore::new();
        store.create(1, 2, "first".into()).await.unwrap();
        store.create(2, 1, "second".into()).await.unwrap();

        let messages = store.conversation(1, 2).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].created_at <= messages[1].created_at);
    }
}
