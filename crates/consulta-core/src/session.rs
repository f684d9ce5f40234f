//! The conversation state holder.
//!
//! A [`ChatSession`] owns the current [`Conversation`] snapshot and drives it
//! through one exchange at a time. Front ends either call [`ChatSession::send`]
//! and await it, or split it into [`ChatSession::begin`], a background
//! [`PendingTurn::resolve`], and [`ChatSession::finish`] so they can keep
//! drawing while the request is in flight.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatBackend, ChatMeta, ChatOptions, ChatReply};
use crate::conversation::{Conversation, ConversationEvent};
use crate::error::{ChatError, Result};
use crate::ids::{IdGenerator, UuidIds};
use crate::state::ChatMessage;

/// How a send ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or another send was still pending. Nothing changed.
    Ignored,
    /// The backend answered and the reply was appended.
    Answered,
    /// The call failed and the fallback message was appended.
    Failed,
}

/// Text of the assistant turn that replaces any failed exchange.
pub fn connection_error_text(endpoint: &str) -> String {
    format!(
        "Hubo un problema al conectar con el backend. Revisá que el API esté en {} y probá de nuevo.",
        endpoint
    )
}

/// A request that has been recorded in the conversation but not yet sent.
pub struct PendingTurn {
    text: String,
    meta: Option<ChatMeta>,
    options: ChatOptions,
    backend: Arc<dyn ChatBackend>,
    cancel: CancellationToken,
}

impl PendingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Perform the network call. Owns everything it needs, so it can be
    /// moved into a spawned task.
    pub async fn resolve(self) -> Result<ChatReply> {
        self.backend
            .chat(&self.text, self.meta.as_ref(), &self.options, &self.cancel)
            .await
    }
}

pub struct ChatSession {
    conversation: Conversation,
    backend: Arc<dyn ChatBackend>,
    ids: Box<dyn IdGenerator>,
    meta: Option<ChatMeta>,
    options: ChatOptions,
    cancel: CancellationToken,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            conversation: Conversation::new(),
            backend,
            ids: Box::new(UuidIds),
            meta: None,
            options: ChatOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Filters sent with every message. An empty meta is sent as `null`.
    pub fn with_meta(mut self, meta: ChatMeta) -> Self {
        self.meta = if meta.is_empty() { None } else { Some(meta) };
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn pending(&self) -> bool {
        self.conversation.pending()
    }

    pub fn endpoint(&self) -> String {
        self.backend.endpoint()
    }

    /// Cancel whatever is in flight. Used on shutdown.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Record the user turn and mark the conversation pending.
    ///
    /// Returns `None` without touching state when `text` is blank or a
    /// request is already outstanding.
    pub fn begin(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() || self.pending() {
            return None;
        }

        let id = self.ids.next_id();
        debug!(%id, "user turn appended");
        self.apply(ConversationEvent::UserSubmitted {
            id,
            text: text.to_string(),
        });

        Some(PendingTurn {
            text: text.to_string(),
            meta: self.meta.clone(),
            options: self.options,
            backend: Arc::clone(&self.backend),
            cancel: self.cancel.clone(),
        })
    }

    /// Record the outcome of the pending turn and clear the pending flag.
    ///
    /// Errors never surface past this point: they are logged and replaced by
    /// the fixed connection error text.
    pub fn finish(&mut self, result: Result<ChatReply>) -> SendOutcome {
        if !self.pending() {
            return SendOutcome::Ignored;
        }

        let id = self.ids.next_id();
        match result {
            Ok(reply) => {
                debug!(%id, sources = reply.sources.len(), "assistant turn appended");
                self.apply(ConversationEvent::ReplyReceived { id, reply });
                SendOutcome::Answered
            }
            Err(e) => {
                warn!(%id, kind = e.kind(), error = %e, "chat exchange failed");
                let text = connection_error_text(&self.backend.endpoint());
                self.apply(ConversationEvent::ReplyFailed { id, text });
                SendOutcome::Failed
            }
        }
    }

    /// One full exchange: user turn, network call, assistant turn.
    ///
    /// If this future is dropped mid-call the turn is still closed with the
    /// error message, so the conversation is never left pending.
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        let Some(turn) = self.begin(text) else {
            return SendOutcome::Ignored;
        };

        let release = PendingRelease {
            session: self,
            armed: true,
        };
        let result = turn.resolve().await;
        release.complete(result)
    }

    fn apply(&mut self, event: ConversationEvent) {
        let current = std::mem::take(&mut self.conversation);
        self.conversation = current.reduce(event);
    }
}

/// Closes the pending turn exactly once, on completion or on drop.
struct PendingRelease<'a> {
    session: &'a mut ChatSession,
    armed: bool,
}

impl PendingRelease<'_> {
    fn complete(mut self, result: Result<ChatReply>) -> SendOutcome {
        self.armed = false;
        self.session.finish(result)
    }
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.finish(Err(ChatError::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NO_ANSWER_TEXT;
    use crate::ids::SequentialIds;
    use crate::state::{ChatRole, Source};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with queued results and records what it was asked.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<Vec<Result<ChatReply>>>,
        seen: Mutex<Vec<(String, Option<ChatMeta>)>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<ChatReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(
            &self,
            message: &str,
            meta: Option<&ChatMeta>,
            _options: &ChatOptions,
            _cancel: &CancellationToken,
        ) -> Result<ChatReply> {
            self.seen
                .lock()
                .unwrap()
                .push((message.to_string(), meta.cloned()));
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ChatError::Cancelled))
        }

        fn endpoint(&self) -> String {
            "http://localhost:8000".to_string()
        }
    }

    /// Never answers until cancelled.
    struct StalledBackend;

    #[async_trait]
    impl ChatBackend for StalledBackend {
        async fn chat(
            &self,
            _message: &str,
            _meta: Option<&ChatMeta>,
            _options: &ChatOptions,
            cancel: &CancellationToken,
        ) -> Result<ChatReply> {
            cancel.cancelled().await;
            Err(ChatError::Cancelled)
        }

        fn endpoint(&self) -> String {
            "http://localhost:8000".to_string()
        }
    }

    fn session(backend: Arc<dyn ChatBackend>) -> ChatSession {
        ChatSession::new(backend).with_ids(SequentialIds::new())
    }

    fn reply(answer: &str, sources: Vec<Source>) -> Result<ChatReply> {
        Ok(ChatReply {
            answer: answer.to_string(),
            sources,
        })
    }

    #[tokio::test]
    async fn test_send_appends_user_then_assistant() {
        let s1 = Source::new(json!({"titulo": "Aranceles"}));
        let s2 = Source::new(json!({"titulo": "Becas"}));
        let backend = ScriptedBackend::with(vec![reply("X", vec![s1.clone(), s2.clone()])]);
        let mut session = session(backend);

        let outcome = session.send("¿Qué becas hay?").await;

        assert_eq!(outcome, SendOutcome::Answered);
        assert!(!session.pending());
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].text, "¿Qué becas hay?");
        assert_eq!(messages[0].id.as_str(), "msg-1");
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].text, "X");
        assert_eq!(messages[1].sources, vec![s1, s2]);
        assert_eq!(messages[1].id.as_str(), "msg-2");
    }

    #[tokio::test]
    async fn test_each_send_adds_exactly_two_messages() {
        let backend = ScriptedBackend::with(vec![
            reply("uno", vec![]),
            Err(ChatError::Timeout(30000)),
            reply("tres", vec![]),
        ]);
        let mut session = session(backend);

        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            session.send(text).await;
            assert_eq!(session.messages().len(), (i + 1) * 2);
            assert!(!session.pending());
        }
    }

    #[tokio::test]
    async fn test_failure_appends_fixed_error_text() {
        let backend = ScriptedBackend::with(vec![Err(ChatError::Status {
            status: 500,
            body: "Traceback: secret internals".to_string(),
        })]);
        let mut session = session(backend);

        let outcome = session.send("hola").await;

        assert_eq!(outcome, SendOutcome::Failed);
        assert!(!session.pending());
        let last = session.conversation().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.text, connection_error_text("http://localhost:8000"));
        assert!(!last.text.contains("Traceback"));
        assert!(last.sources.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_one_error_turn() {
        let backend = ScriptedBackend::with(vec![Err(ChatError::Timeout(50))]);
        let mut session = session(backend);

        session.send("hola").await;

        let assistant: Vec<_> = session
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].text, connection_error_text("http://localhost:8000"));
        assert!(!session.pending());
    }

    #[tokio::test]
    async fn test_blank_input_changes_nothing() {
        let backend = ScriptedBackend::with(vec![reply("x", vec![])]);
        let mut session = session(backend.clone());

        assert_eq!(session.send("").await, SendOutcome::Ignored);
        assert_eq!(session.send("   \n\t ").await, SendOutcome::Ignored);

        assert!(session.messages().is_empty());
        assert!(!session.pending());
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_text_is_sent_untrimmed() {
        let backend = ScriptedBackend::with(vec![reply("x", vec![])]);
        let mut session = session(backend.clone());

        session.send("  hola  ").await;

        assert_eq!(session.messages()[0].text, "  hola  ");
        assert_eq!(backend.seen.lock().unwrap()[0].0, "  hola  ");
    }

    #[tokio::test]
    async fn test_meta_is_forwarded() {
        let backend = ScriptedBackend::with(vec![reply("x", vec![]), reply("y", vec![])]);
        let meta = ChatMeta {
            periodo: Some("2025".to_string()),
            ..Default::default()
        };
        let mut with_meta = session(backend.clone()).with_meta(meta.clone());
        with_meta.send("a").await;

        let mut empty_meta = session(backend.clone()).with_meta(ChatMeta::default());
        empty_meta.send("b").await;

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1, Some(meta));
        assert_eq!(seen[1].1, None);
    }

    #[tokio::test]
    async fn test_missing_answer_fallback_reaches_conversation() {
        let backend = ScriptedBackend::with(vec![Ok(ChatReply::from_value(json!({
            "sources": "not-a-list"
        })))]);
        let mut session = session(backend);

        session.send("hola").await;

        let last = session.conversation().last().unwrap();
        assert_eq!(last.text, NO_ANSWER_TEXT);
        assert!(last.sources.is_empty());
    }

    #[tokio::test]
    async fn test_begin_and_finish_bracket_pending() {
        let backend = ScriptedBackend::with(vec![reply("x", vec![])]);
        let mut session = session(backend);
        assert!(!session.pending());

        let turn = session.begin("hola").expect("turn should start");
        assert!(session.pending());
        assert_eq!(session.messages().len(), 1);

        // A second send while pending is refused.
        assert!(session.begin("otra").is_none());
        assert_eq!(session.messages().len(), 1);

        let result = turn.resolve().await;
        assert_eq!(session.finish(result), SendOutcome::Answered);
        assert!(!session.pending());
        assert_eq!(session.messages().len(), 2);

        // Nothing left to finish.
        assert_eq!(session.finish(reply("late", vec![])), SendOutcome::Ignored);
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_send_still_releases_pending() {
        let mut session = session(Arc::new(StalledBackend));

        let res = tokio::time::timeout(Duration::from_millis(20), session.send("hola")).await;
        assert!(res.is_err());

        assert!(!session.pending());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(
            session.messages()[1].text,
            connection_error_text("http://localhost:8000")
        );
    }

    #[tokio::test]
    async fn test_cancel_all_fails_the_pending_turn() {
        let mut session = session(Arc::new(StalledBackend));
        let turn = session.begin("hola").unwrap();
        let handle = tokio::spawn(turn.resolve());

        session.cancel_all();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(ChatError::Cancelled)));
        assert_eq!(session.finish(result), SendOutcome::Failed);
        assert!(!session.pending());
    }
}
