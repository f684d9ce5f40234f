//! Message id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::state::MessageId;

/// Source of message ids for a session.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> MessageId;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> MessageId {
        MessageId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// `msg-1`, `msg-2`, ... Deterministic, for tests and replays.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> MessageId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::new(format!("msg-{}", n))
    }
}
