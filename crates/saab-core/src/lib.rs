pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod state;
pub mod stream;

// Re-export main types for convenience
pub use client::ChatClient;
pub use config::Config;
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use state::{ChatMessage, ChatRole, ConversationState, StreamChunk, TurnRequest};
pub use stream::StreamDecoder;
