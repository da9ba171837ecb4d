use crate::domain::{Conversation, DirectMessage};
use crate::error::Result;
use crate::storage::MessageStore;
use crate::storage::records::{ConversationRecord, MessageRecord};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create(&self, sender_id: i64, receiver_id: i64, content: String) -> Result<DirectMessage> {
        let rec = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO direct_messages (id, sender_id, receiver_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, sender_id, receiver_id, content, "read", created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(rec.into())
    }

    async fn conversation(&self, user_id: i64, peer_id: i64) -> Result<Vec<DirectMessage>> {
        let recs = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, receiver_id, content, "read", created_at
            FROM direct_messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recs.into_iter().map(Into::into).collect())
    }

    async fn mark_read(&self, receiver_id: i64, sender_id: i64) -> Result<u64> {
        // NOT "read" in the predicate keeps the transition one-way.
        let result = sqlx::query(
            r#"
            UPDATE direct_messages SET "read" = TRUE
            WHERE receiver_id = $1 AND sender_id = $2 AND NOT "read"
            "#,
        )
        .bind(receiver_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let recs = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS peer_id,
                   MAX(created_at) AS last_message_at,
                   COUNT(*) FILTER (WHERE receiver_id = $1 AND NOT "read") AS unread_count
            FROM direct_messages
            WHERE $1 IN (sender_id, receiver_id)
            GROUP BY 1
            ORDER BY last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recs.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
