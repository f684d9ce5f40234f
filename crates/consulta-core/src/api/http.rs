use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::deadline::Deadline;
use super::types::{ChatMeta, ChatOptions, ChatReply, ChatRequest};
use super::ChatBackend;
use crate::error::{ChatError, Result};

/// Client for the backend's `POST /chat/` endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: Client,
    base_url: Url,
    chat_url: Url,
    session_id: Option<String>,
    bot_id: Option<String>,
}

impl HttpChatClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        // Without the trailing slash, `join` would replace the last path segment.
        let mut base = base_url.trim().trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;
        let chat_url = base_url.join("chat/")?;

        Ok(Self {
            client,
            base_url,
            chat_url,
            session_id: None,
            bot_id: None,
        })
    }

    /// Ask the backend to keep conversational context under this id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Select a bot profile on the backend.
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// Send one message and wait for the answer.
    ///
    /// The call gives up after `options.timeout` with [`ChatError::Timeout`],
    /// or as soon as `cancel` fires with [`ChatError::Cancelled`]. Either way
    /// the in-flight request is dropped.
    pub async fn chat(
        &self,
        message: &str,
        meta: Option<&ChatMeta>,
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatReply> {
        let call_token = cancel.child_token();
        let _deadline = Deadline::arm(call_token.clone(), options.timeout);
        let started = Instant::now();

        debug!(url = %self.chat_url, chars = message.chars().count(), "sending chat request");

        let outcome = tokio::select! {
            _ = call_token.cancelled() => {
                if cancel.is_cancelled() {
                    Err(ChatError::Cancelled)
                } else {
                    Err(ChatError::Timeout(options.timeout.as_millis() as u64))
                }
            }
            result = self.send(message, meta) => result,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(reply) => debug!(elapsed_ms, sources = reply.sources.len(), "chat request finished"),
            Err(e) => warn!(elapsed_ms, kind = e.kind(), error = %e, "chat request failed"),
        }

        outcome
    }

    async fn send(&self, message: &str, meta: Option<&ChatMeta>) -> Result<ChatReply> {
        let request = ChatRequest {
            message,
            meta,
            session_id: self.session_id.as_deref(),
            bot_id: self.bot_id.as_deref(),
        };

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                text
            };
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(ChatReply::from_value(value))
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn chat(
        &self,
        message: &str,
        meta: Option<&ChatMeta>,
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatReply> {
        HttpChatClient::chat(self, message, meta, options, cancel).await
    }

    fn endpoint(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}
