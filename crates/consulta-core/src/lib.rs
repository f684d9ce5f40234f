pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ids;
pub mod input;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use api::{ChatBackend, ChatMeta, ChatOptions, ChatReply, HttpChatClient};
pub use config::{Config, Settings};
pub use conversation::{Conversation, ConversationEvent};
pub use error::ChatError;
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use input::{InputMode, InputState};
pub use session::{ChatSession, PendingTurn, SendOutcome};
pub use state::{ChatMessage, ChatRole, MessageId, Source};
