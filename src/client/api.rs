use crate::api::schemas::messaging::{MarkReadResponse, SendMessageRequest};
use crate::client::ClientError;
use crate::domain::{Conversation, DirectMessage};
use serde::de::DeserializeOwned;

/// REST client for the durable half of the delivery path.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), token: token.into() }
    }

    /// `POST /v1/messages/{recipientId}` — persists a message.
    ///
    /// # Errors
    /// Returns `ClientError::Api` on a non-success status.
    pub async fn send_message(&self, recipient_id: i64, content: &str) -> Result<DirectMessage, ClientError> {
        let response = self
            .http
            .post(format!("{}/v1/messages/{recipient_id}", self.base_url))
            .bearer_auth(&self.token)
            .json(&SendMessageRequest { content: content.to_string() })
            .send()
            .await?;

        Self::parse(response).await
    }

    /// `POST /v1/messages/{peerId}/read` — flips read receipts, returns how
    /// many messages were updated.
    ///
    /// # Errors
    /// Returns `ClientError::Api` on a non-success status.
    pub async fn mark_conversation_read(&self, peer_id: i64) -> Result<u64, ClientError> {
        let response = self
            .http
            .post(format!("{}/v1/messages/{peer_id}/read", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body: MarkReadResponse = Self::parse(response).await?;
        Ok(body.updated)
    }

    /// `GET /v1/messages/{peerId}` — the conversation, oldest first.
    ///
    /// # Errors
    /// Returns `ClientError::Api` on a non-success status.
    pub async fn messages(&self, peer_id: i64) -> Result<Vec<DirectMessage>, ClientError> {
        let response = self
            .http
            .get(format!("{}/v1/messages/{peer_id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::parse(response).await
    }

    /// `GET /v1/conversations` — derived conversation list.
    ///
    /// # Errors
    /// Returns `ClientError::Api` on a non-success status.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        let response =
            self.http.get(format!("{}/v1/conversations", self.base_url)).bearer_auth(&self.token).send().await?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api { status: status.as_u16(), message })
        }
    }
}
