//! Model stream protocol
//!
//! Events produced while a language model generates code for one turn.
//! The `stream` events carry incremental text that the tag extractor
//! re-scans; `complete` is terminal and carries the full text.

use serde::{Deserialize, Serialize};

/// One event of the model generation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free-form status line
    Status { message: String },

    /// Reasoning text, streamed before code
    Thinking { text: String },

    /// Reasoning finished
    ThinkingComplete {
        #[serde(default)]
        duration: Option<f64>,
    },

    /// Prose meant to be surfaced verbatim in the chat
    Conversation { text: String },

    /// Incremental generated text for the extractor
    #[serde(alias = "raw")]
    Stream {
        text: String,
        #[serde(default)]
        raw: bool,
    },

    /// Package requested through a tool-style side channel
    Package {
        name: String,
        #[serde(default)]
        message: Option<String>,
    },

    /// Terminal event with the full generated text
    #[serde(rename_all = "camelCase")]
    Complete {
        #[serde(default)]
        generated_code: String,
        #[serde(default)]
        explanation: Option<String>,
        #[serde(default)]
        packages_to_install: Vec<String>,
    },

    /// Generation failed
    Error { error: String },

    /// Any event type this version does not know about
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Get the event type as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::ThinkingComplete { .. } => "thinking_complete",
            StreamEvent::Conversation { .. } => "conversation",
            StreamEvent::Stream { .. } => "stream",
            StreamEvent::Package { .. } => "package",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// Incremental code text carried by this event, if any
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::Stream { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_event_wire_format() {
        let json = r#"{"type":"complete","generatedCode":"<file path=\"a.jsx\"></file>","explanation":"done","packagesToInstall":["axios"]}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();

        match event {
            StreamEvent::Complete {
                generated_code,
                explanation,
                packages_to_install,
            } => {
                assert!(generated_code.starts_with("<file"));
                assert_eq!(explanation.as_deref(), Some("done"));
                assert_eq!(packages_to_install, vec!["axios".to_string()]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_and_fields_are_tolerated() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"app","name":"App.jsx"}"#).unwrap();
        assert_eq!(event, StreamEvent::Unknown);

        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"stream","text":"abc","raw":true,"seq":4}"#).unwrap();
        assert_eq!(event.text_delta(), Some("abc"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_raw_alias() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"raw","text":"x"}"#).unwrap();
        assert_eq!(event.kind(), "stream");
    }
}
