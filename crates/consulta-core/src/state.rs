//! UI-agnostic conversation types
//!
//! These are shared by every front end (the terminal UI, the one-shot `ask`
//! command) and don't depend on any UI framework.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a message, unique within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub text: String,
    /// Citations for assistant turns; always empty for user turns.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ChatMessage {
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::User,
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(id: MessageId, text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            id,
            role: ChatRole::Assistant,
            text: text.into(),
            sources,
        }
    }
}

/// Citation metadata returned by the backend.
///
/// The client passes it through untouched. The accessors only read the
/// handful of keys the renderer knows how to show.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(Value);

impl Source {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn title(&self) -> Option<String> {
        self.text_field("titulo")
    }

    pub fn kind(&self) -> Option<String> {
        self.text_field("tipo")
    }

    pub fn file(&self) -> Option<String> {
        self.text_field("fuente_archivo")
    }

    pub fn sheet(&self) -> Option<String> {
        self.text_field("fuente_hoja")
    }

    pub fn row(&self) -> Option<String> {
        self.text_field("fuente_fila")
    }

    pub fn period(&self) -> Option<String> {
        self.text_field("periodo")
    }

    /// Heading shown for the citation: title, then type, then a generic label.
    pub fn heading(&self) -> String {
        self.title()
            .or_else(|| self.kind())
            .unwrap_or_else(|| "Fuente".to_string())
    }

    /// "file · sheet · fila N", skipping the parts that are missing.
    pub fn locator(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(file) = self.file() {
            parts.push(file);
        }
        if let Some(sheet) = self.sheet() {
            parts.push(sheet);
        }
        if let Some(row) = self.row() {
            parts.push(format!("fila {}", row));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" · "))
        }
    }

    // Strings come back as-is, numbers are formatted, null/empty counts as absent.
    fn text_field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
