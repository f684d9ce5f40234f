//! Conversation snapshot and its transition function.
//!
//! A [`Conversation`] is never mutated in place: every change goes through
//! [`Conversation::reduce`], which consumes the old snapshot and returns the
//! next one. The two ordering rules of a send (user turn first, assistant
//! turn after the call resolves, pending cleared with the second append) are
//! encoded here so they can be checked without any network.

use crate::api::ChatReply;
use crate::state::{ChatMessage, MessageId};

/// A state change of the conversation.
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    /// The user sent a message; the request is now in flight.
    UserSubmitted { id: MessageId, text: String },
    /// The backend answered.
    ReplyReceived { id: MessageId, reply: ChatReply },
    /// The request failed; `text` is the message shown in its place.
    ReplyFailed { id: MessageId, text: String },
}

/// Ordered turns plus the pending flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    pending: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while a request is outstanding.
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Apply one event and return the next snapshot.
    pub fn reduce(mut self, event: ConversationEvent) -> Self {
        match event {
            ConversationEvent::UserSubmitted { id, text } => {
                self.messages.push(ChatMessage::user(id, text));
                self.pending = true;
            }
            ConversationEvent::ReplyReceived { id, reply } => {
                self.messages
                    .push(ChatMessage::assistant(id, reply.answer, reply.sources));
                self.pending = false;
            }
            ConversationEvent::ReplyFailed { id, text } => {
                self.messages
                    .push(ChatMessage::assistant(id, text, Vec::new()));
                self.pending = false;
            }
        }
        self
    }
}
