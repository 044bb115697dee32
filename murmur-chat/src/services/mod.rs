pub mod chat_service;

pub use chat_service::{ChatDetail, ChatService, ChatSummary, CreateChat, MessageTarget};
