pub mod auth;
pub mod message_service;
pub mod relay;
pub mod session;

pub use message_service::MessageService;
pub use relay::RelayService;
