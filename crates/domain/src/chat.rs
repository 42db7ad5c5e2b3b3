use serde::{Deserialize, Serialize};

/// Token accounting reported by a provider at the end of a stream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Event a provider adapter emits while streaming a chat completion.
///
/// A conforming stream ends with exactly one terminal event (`Final` or
/// `Error`); the turn runner forwards every event it receives, in order,
/// to its `onEvent` sink before acting on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Delta {
        text: String,
    },
    ToolCall {
        name: String,
        input: serde_json::Value,
        #[serde(rename = "callId")]
        call_id: String,
    },
    Final {
        usage: Usage,
    },
    Error {
        message: String,
    },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Final { .. } | ChatEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_event_serializes_with_tag() {
        let event = ChatEvent::Delta {
            text: "hi".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "delta");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn tool_call_call_id_uses_camel_case_on_wire() {
        let event = ChatEvent::ToolCall {
            name: "exec".into(),
            input: serde_json::json!({"command": "ls"}),
            call_id: "call-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["callId"], "call-1");
    }

    #[test]
    fn final_and_error_are_terminal() {
        assert!(ChatEvent::Final {
            usage: Usage::default()
        }
        .is_terminal());
        assert!(ChatEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!ChatEvent::Delta { text: "x".into() }.is_terminal());
    }
}
