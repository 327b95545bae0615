// src/lib.rs

pub mod chat;
pub mod config;
pub mod core;
pub mod error;
pub mod testing;

pub use chat::{ChatService, ContentItem, ContentKind, ReplyStream, SessionState, Turn};
pub use error::{ChatError, ChatResult};
