use crate::client::api::ApiClient;
use crate::client::backoff::ReconnectPolicy;
use crate::client::cache::{CacheSynchronizer, QueryCache, QueryKey};
use crate::client::connection::{ConnectionManager, ConnectionStatus, MessageHandler, StatusHandler, Subscription};
use crate::client::ClientError;
use crate::domain::{ClientEvent, Conversation, DirectMessage, ServerEvent};
use std::fmt;
use std::sync::Arc;

/// Ties the delivery path together for one user: the relay socket for
/// low-latency push, the REST client for durability, and the query cache kept
/// honest by inbound events.
pub struct Messenger {
    user_id: i64,
    connection: Arc<ConnectionManager>,
    api: ApiClient,
    cache: Arc<QueryCache>,
    // Held so cache synchronization lives as long as the messenger.
    _cache_subscription: Subscription<MessageHandler>,
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger").field("user_id", &self.user_id).finish_non_exhaustive()
    }
}

impl Messenger {
    #[must_use]
    pub fn new(
        server_url: impl Into<String>,
        ws_endpoint: impl Into<String>,
        user_id: i64,
        token: impl Into<String> + Clone,
        policy: ReconnectPolicy,
    ) -> Self {
        let cache = Arc::new(QueryCache::new());
        let connection = Arc::new(ConnectionManager::new(ws_endpoint, user_id, token.clone(), policy));
        let api = ApiClient::new(server_url, token);

        let synchronizer = CacheSynchronizer::new(Arc::clone(&cache), user_id);
        let cache_subscription = connection.add_message_handler(move |event| synchronizer.apply(event));

        Self { user_id, connection, api, cache, _cache_subscription: cache_subscription }
    }

    pub fn connect(&self) {
        self.connection.connect();
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn add_status_handler(
        &self,
        handler: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription<StatusHandler> {
        self.connection.add_status_handler(handler)
    }

    pub fn add_message_handler(
        &self,
        handler: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> Subscription<MessageHandler> {
        self.connection.add_message_handler(handler)
    }

    /// Dual-path send: pushes over the socket when connected for latency, and
    /// always persists through the REST API. The two paths are not atomic; a
    /// push can arrive before or after the write is durable, and a REST
    /// failure does not recall an already-broadcast frame.
    ///
    /// # Errors
    /// Returns `ClientError` if the REST persistence call fails.
    pub async fn send_direct_message(&self, receiver_id: i64, content: &str) -> Result<DirectMessage, ClientError> {
        let pushed = self
            .connection
            .send(ClientEvent::DirectMessage { receiver_id, content: content.to_string() });
        if !pushed {
            tracing::debug!(receiver_id, "Realtime push skipped; relying on REST delivery");
        }

        let message = self.api.send_message(receiver_id, content).await?;

        self.cache.invalidate(&QueryKey::Messages { peer_id: receiver_id });
        self.cache.invalidate(&QueryKey::Conversations);

        Ok(message)
    }

    /// Marks the conversation with `peer_id` as read.
    ///
    /// # Errors
    /// Returns `ClientError` if the REST call fails.
    pub async fn mark_conversation_read(&self, peer_id: i64) -> Result<u64, ClientError> {
        let updated = self.api.mark_conversation_read(peer_id).await?;
        if updated > 0 {
            self.cache.invalidate(&QueryKey::Messages { peer_id });
            self.cache.invalidate(&QueryKey::Conversations);
        }
        Ok(updated)
    }

    /// Fetches the conversation with `peer_id` from the REST API.
    ///
    /// # Errors
    /// Returns `ClientError` if the REST call fails.
    pub async fn conversation(&self, peer_id: i64) -> Result<Vec<DirectMessage>, ClientError> {
        self.api.messages(peer_id).await
    }

    /// Fetches the conversation list from the REST API.
    ///
    /// # Errors
    /// Returns `ClientError` if the REST call fails.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        self.api.conversations().await
    }
}
