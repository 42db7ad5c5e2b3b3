use serde::Serialize;

/// Structured trace events emitted across all gateway crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RpcDispatch {
        method: String,
        id: Option<String>,
        duration_ms: u64,
        ok: bool,
    },
    SessionCreated {
        session_id: String,
        agent_id: String,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
    ToolExec {
        tool_name: String,
        call_id: String,
        duration_ms: u64,
        truncated: bool,
    },
    ToolDenied {
        tool_name: String,
        approval_id: String,
    },
    ApprovalRequested {
        approval_id: String,
        tool_name: String,
    },
    ApprovalResolved {
        approval_id: String,
        approved: bool,
    },
    SchedulerRun {
        job_id: String,
        session_id: String,
        outcome: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "gateway_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_exec_serializes_with_event_tag() {
        let event = TraceEvent::ToolExec {
            tool_name: "exec".into(),
            call_id: "call-1".into(),
            duration_ms: 42,
            truncated: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ToolExec");
        assert_eq!(json["tool_name"], "exec");
    }
}
