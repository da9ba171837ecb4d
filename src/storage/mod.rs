use crate::domain::{Conversation, DirectMessage};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod pg;
mod records;

pub use memory::MemoryStore;
pub use pg::PgMessageStore;

/// Durable message storage behind the REST persistence path. The relay itself
/// never touches this; only the REST handlers do.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Persists a new message with `read = false` and a server-side timestamp.
    async fn create(&self, sender_id: i64, receiver_id: i64, content: String) -> Result<DirectMessage>;

    /// All messages between the two participants, oldest first.
    async fn conversation(&self, user_id: i64, peer_id: i64) -> Result<Vec<DirectMessage>>;

    /// Flips unread messages from `sender_id` to `receiver_id` to read.
    /// Monotonic: never transitions read back to unread. Returns the number of
    /// messages updated.
    async fn mark_read(&self, receiver_id: i64, sender_id: i64) -> Result<u64>;

    /// Derived conversation list for a user, most recent first.
    async fn conversations(&self, user_id: i64) -> Result<Vec<Conversation>>;

    /// Storage connectivity check for the readiness probe.
    async fn ping(&self) -> Result<()>;
}

/// Creates the Postgres connection pool.
///
/// # Errors
/// Returns an error if the database is unreachable.
pub async fn init_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    Ok(pool)
}

/// Runs embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    Ok(())
}
