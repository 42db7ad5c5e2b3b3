//! JSON-RPC 2.0 frame shapes carried over the WebSocket (§4.1/§6/§7).
//!
//! Three frame kinds share the socket: RPC requests (client → gateway),
//! RPC responses (gateway → client, correlated by `id`), and push
//! events (gateway → client, correlated by `runId` rather than `id` —
//! a push event isn't a response to any particular request).

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: &gw_domain::error::Error) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code: error.rpc_code(),
                message: error.to_string(),
                data: None,
            }),
        }
    }
}

/// A push frame: `{event:string, data:object}` (§4.1), correlated by the
/// `runId`/`approvalId`/`jobId` inside `data` rather than by an `id` —
/// a push event isn't a response to any particular request.
#[derive(Debug, Clone)]
pub enum PushEvent {
    ChatDelta {
        run_id: String,
        text: String,
    },
    ChatFinal {
        run_id: String,
        usage: gw_domain::chat::Usage,
    },
    ChatError {
        run_id: String,
        message: String,
    },
    ApprovalRequested {
        request: gw_domain::tool::ApprovalRequest,
    },
    ToolProgress {
        run_id: String,
        message: String,
    },
    ToolAttachments {
        run_id: String,
        tool: String,
        attachments: Vec<gw_domain::tool::Attachment>,
    },
    SchedulerRunCompleted {
        job_id: String,
        job_name: String,
        run_id: String,
        session_key: Option<String>,
        status: String,
        summary: Option<String>,
        error: Option<String>,
    },
}

impl PushEvent {
    /// Translate a provider's streamed `ChatEvent` into the push event the
    /// client actually receives, or `None` for events (like `tool_call`)
    /// that are internal to the turn loop and never cross the wire.
    pub fn from_chat_event(run_id: &str, event: &gw_domain::chat::ChatEvent) -> Option<Self> {
        use gw_domain::chat::ChatEvent;
        match event {
            ChatEvent::Delta { text } => Some(PushEvent::ChatDelta {
                run_id: run_id.to_string(),
                text: text.clone(),
            }),
            ChatEvent::Final { usage } => Some(PushEvent::ChatFinal {
                run_id: run_id.to_string(),
                usage: *usage,
            }),
            ChatEvent::Error { message } => Some(PushEvent::ChatError {
                run_id: run_id.to_string(),
                message: message.clone(),
            }),
            ChatEvent::ToolCall { .. } => None,
        }
    }
}

impl Serialize for PushEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (event, data) = match self {
            PushEvent::ChatDelta { run_id, text } => {
                ("chat.delta", json!({ "runId": run_id, "text": text }))
            }
            PushEvent::ChatFinal { run_id, usage } => {
                ("chat.final", json!({ "runId": run_id, "usage": usage }))
            }
            PushEvent::ChatError { run_id, message } => {
                ("chat.error", json!({ "runId": run_id, "message": message }))
            }
            PushEvent::ApprovalRequested { request } => (
                "exec.approval_request",
                serde_json::to_value(request).unwrap_or(Value::Null),
            ),
            PushEvent::ToolProgress { run_id, message } => {
                ("tool.progress", json!({ "runId": run_id, "message": message }))
            }
            PushEvent::ToolAttachments {
                run_id,
                tool,
                attachments,
            } => (
                "tool.attachments",
                json!({ "runId": run_id, "tool": tool, "attachments": attachments }),
            ),
            PushEvent::SchedulerRunCompleted {
                job_id,
                job_name,
                run_id,
                session_key,
                status,
                summary,
                error,
            } => (
                "scheduler.run_completed",
                json!({
                    "jobId": job_id,
                    "jobName": job_name,
                    "runId": run_id,
                    "sessionKey": session_key,
                    "status": status,
                    "summary": summary,
                    "error": error,
                }),
            ),
        };
        let mut map = serde_json::Map::with_capacity(2);
        map.insert("event".to_string(), Value::String(event.to_string()));
        map.insert("data".to_string(), data);
        Value::Object(map).serialize(serializer)
    }
}

/// Parse an incoming text frame as an RPC request, producing the JSON-RPC
/// parse-error code on failure so the caller can still send a response
/// even though it has no usable `id`.
pub fn parse_request(raw: &str) -> Result<RpcRequest, gw_domain::error::Error> {
    serde_json::from_str(raw).map_err(|e| gw_domain::error::Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_request() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"method":"session.create","params":{}}"#;
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, "session.create");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_request("{ not json").unwrap_err();
        assert_eq!(err.rpc_code(), -32700);
    }

    #[test]
    fn ok_response_serializes_without_error_field() {
        let resp = RpcResponse::ok(Value::from(1), serde_json::json!({"ok": true}));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("result").is_some());
    }

    #[test]
    fn push_event_uses_event_data_envelope() {
        let event = PushEvent::ChatDelta {
            run_id: "run-1".into(),
            text: "hi".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chat.delta");
        assert_eq!(json["data"]["runId"], "run-1");
        assert_eq!(json["data"]["text"], "hi");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn chat_tool_call_event_has_no_push_translation() {
        let event = gw_domain::chat::ChatEvent::ToolCall {
            name: "bash".into(),
            input: serde_json::json!({}),
            call_id: "c1".into(),
        };
        assert!(PushEvent::from_chat_event("run-1", &event).is_none());
    }

    #[test]
    fn scheduler_run_completed_uses_named_event() {
        let event = PushEvent::SchedulerRunCompleted {
            job_id: "job-1".into(),
            job_name: "nightly".into(),
            run_id: "run-1".into(),
            session_key: Some("sess-1".into()),
            status: "success".into(),
            summary: Some("done".into()),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "scheduler.run_completed");
        assert_eq!(json["data"]["jobName"], "nightly");
        assert_eq!(json["data"]["sessionKey"], "sess-1");
    }
}
