pub mod event;
pub mod message;

pub use event::{ClientEvent, ServerEvent, is_clean_close};
pub use message::{Conversation, DirectMessage};
