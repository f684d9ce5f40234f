use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Source;

/// Shown when the backend answered without a usable `answer` field.
pub const NO_ANSWER_TEXT: &str = "No pude generar una respuesta.";

/// Default client-side timeout for one exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Optional retrieval filters forwarded to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facultad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalidad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrera_id: Option<String>,
}

impl ChatMeta {
    pub fn is_empty(&self) -> bool {
        self.periodo.is_none()
            && self.facultad.is_none()
            && self.carrera.is_none()
            && self.modalidad.is_none()
            && self.carrera_id.is_none()
    }

    /// Fields set in `other` win over the ones in `self`.
    pub fn merge(&mut self, other: ChatMeta) {
        if other.periodo.is_some() {
            self.periodo = other.periodo;
        }
        if other.facultad.is_some() {
            self.facultad = other.facultad;
        }
        if other.carrera.is_some() {
            self.carrera = other.carrera;
        }
        if other.modalidad.is_some() {
            self.modalidad = other.modalidad;
        }
        if other.carrera_id.is_some() {
            self.carrera_id = other.carrera_id;
        }
    }
}

/// Body of `POST /chat/`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
    pub meta: Option<&'a ChatMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<&'a str>,
}

/// Per-call knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    pub timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ChatOptions {
    pub fn with_timeout_ms(ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(ms),
        }
    }
}

/// The backend's answer, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl ChatReply {
    /// Build a reply from whatever JSON the backend sent.
    ///
    /// `{answer, sources}` is a contract, not a guarantee: a missing, empty or
    /// non-string `answer` becomes [`NO_ANSWER_TEXT`], and a missing or
    /// non-array `sources` becomes empty. Source order is preserved.
    pub fn from_value(mut value: Value) -> Self {
        let answer = match value.get("answer") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => NO_ANSWER_TEXT.to_string(),
        };

        let sources = match value.get_mut("sources").map(Value::take) {
            Some(Value::Array(items)) => items.into_iter().map(Source::new).collect(),
            _ => Vec::new(),
        };

        Self { answer, sources }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_keeps_answer_and_source_order() {
        let reply = ChatReply::from_value(json!({
            "answer": "X",
            "sources": [{"titulo": "s1"}, {"titulo": "s2"}]
        }));

        assert_eq!(reply.answer, "X");
        let titles: Vec<_> = reply.sources.iter().filter_map(|s| s.title()).collect();
        assert_eq!(titles, vec!["s1", "s2"]);
    }

    #[test]
    fn test_missing_answer_uses_fallback() {
        let reply = ChatReply::from_value(json!({"sources": []}));
        assert_eq!(reply.answer, NO_ANSWER_TEXT);
    }

    #[test]
    fn test_empty_or_mistyped_answer_uses_fallback() {
        assert_eq!(ChatReply::from_value(json!({"answer": ""})).answer, NO_ANSWER_TEXT);
        assert_eq!(ChatReply::from_value(json!({"answer": 42})).answer, NO_ANSWER_TEXT);
        assert_eq!(ChatReply::from_value(json!({"answer": null})).answer, NO_ANSWER_TEXT);
    }

    #[test]
    fn test_missing_or_non_array_sources_are_empty() {
        assert!(ChatReply::from_value(json!({"answer": "a"})).sources.is_empty());
        assert!(ChatReply::from_value(json!({"answer": "a", "sources": "x"})).sources.is_empty());
        assert!(ChatReply::from_value(json!({"answer": "a", "sources": {"titulo": "x"}})).sources.is_empty());
    }

    #[test]
    fn test_non_object_body_is_normalized() {
        let reply = ChatReply::from_value(json!([1, 2, 3]));
        assert_eq!(reply.answer, NO_ANSWER_TEXT);
        assert!(reply.sources.is_empty());
    }

    #[test]
    fn test_request_body_without_meta() {
        let body = ChatRequest {
            message: "hola",
            meta: None,
            session_id: None,
            bot_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"message": "hola", "meta": null})
        );
    }

    #[test]
    fn test_request_body_with_meta_and_session() {
        let meta = ChatMeta {
            periodo: Some("2025".to_string()),
            facultad: Some("Ciencias sociales".to_string()),
            ..Default::default()
        };
        let body = ChatRequest {
            message: "hola",
            meta: Some(&meta),
            session_id: Some("abc"),
            bot_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "message": "hola",
                "meta": {"periodo": "2025", "facultad": "Ciencias sociales"},
                "session_id": "abc"
            })
        );
    }

    #[test]
    fn test_meta_merge_prefers_other() {
        let mut base = ChatMeta {
            periodo: Some("2024".to_string()),
            carrera: Some("Abogacía".to_string()),
            ..Default::default()
        };
        base.merge(ChatMeta {
            periodo: Some("2025".to_string()),
            ..Default::default()
        });

        assert_eq!(base.periodo.as_deref(), Some("2025"));
        assert_eq!(base.carrera.as_deref(), Some("Abogacía"));
        assert!(!base.is_empty());
        assert!(ChatMeta::default().is_empty());
    }
}
