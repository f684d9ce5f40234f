mod deadline;
pub mod http;
pub mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use http::HttpChatClient;
pub use types::{ChatMeta, ChatOptions, ChatReply, DEFAULT_TIMEOUT, NO_ANSWER_TEXT};

/// Anything that can answer a chat message.
///
/// [`HttpChatClient`] is the real implementation; sessions take the trait so
/// tests can script replies and failures.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        message: &str,
        meta: Option<&ChatMeta>,
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatReply>;

    /// Where requests go, for display and for the connection error text.
    fn endpoint(&self) -> String;
}
