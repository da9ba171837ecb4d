use crate::domain::{Conversation, DirectMessage};
use crate::error::{AppError, Result};
use crate::storage::MessageStore;
use std::sync::Arc;

/// Orchestrates the durable message path. Validation lives here so both the
/// Postgres and in-memory stores stay dumb.
#[derive(Clone, Debug)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
}

impl MessageService {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Persists a message from `sender_id` to `receiver_id`.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the participants are not distinct or
    /// the content is empty, `AppError::Database` on storage failure.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content),
        fields(sender_id = %sender_id, receiver_id = %receiver_id)
    )]
    pub async fn send(&self, sender_id: i64, receiver_id: i64, content: String) -> Result<DirectMessage> {
        if sender_id == receiver_id {
            return Err(AppError::BadRequest("Sender and receiver must be distinct".to_string()));
        }
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("Message content must not be empty".to_string()));
        }

        let message = self.store.create(sender_id, receiver_id, content).await?;
        tracing::debug!(message_id = %message.id, "Message stored");
        Ok(message)
    }

    /// Marks every unread message from `peer_id` to `user_id` as read.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id, peer_id = %peer_id))]
    pub async fn mark_read(&self, user_id: i64, peer_id: i64) -> Result<u64> {
        let updated = self.store.mark_read(user_id, peer_id).await?;
        if updated > 0 {
            tracing::debug!(updated, "Read receipts applied");
        }
        Ok(updated)
    }

    /// Lists the conversation between `user_id` and `peer_id`, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure.
    pub async fn conversation(&self, user_id: i64, peer_id: i64) -> Result<Vec<DirectMessage>> {
        self.store.conversation(user_id, peer_id).await
    }

    /// Lists a user's conversations, most recent first.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure.
    pub async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        self.store.conversations(user_id).await
    }

    /// Readiness check against the backing store.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
