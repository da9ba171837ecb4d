//! Client side of the delivery path: a connection manager owning one relay
//! socket per user, the REST client for the durable path, and the query-cache
//! synchronizer that keeps cached reads honest when pushes arrive.

use thiserror::Error;

pub mod api;
pub mod backoff;
pub mod cache;
pub mod connection;
pub mod messenger;

pub use api::ApiClient;
pub use backoff::ReconnectPolicy;
pub use cache::{CacheSynchronizer, QueryCache, QueryKey};
pub use connection::{ConnectionManager, ConnectionStatus, MessageHandler, StatusHandler, Subscription};
pub use messenger::Messenger;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server rejected request ({status}): {message}")]
    Api { status: u16, message: String },
}
