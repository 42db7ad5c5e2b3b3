//! Agent turn runner (§4.4): the tool-use loop that drives one provider
//! conversation from a user message to a final answer, invoking tools
//! and feeding their results back as new turns.

use std::sync::Arc;

use futures_util::StreamExt;
use uuid::Uuid;

use gw_domain::chat::ChatEvent;
use gw_domain::error::Result;
use gw_domain::tool::{ContentPart, Message, ToolCall};
use gw_providers::{ChatRequest, Provider};
use gw_tools::{ToolContext, ToolRegistry};

use crate::runner::active_runs::CancelToken;

/// Hard cap on tool-use round trips within a single turn (§4.4). Hitting
/// it emits a synthetic `error` event rather than looping forever.
pub const MAX_TURN_LOOPS: usize = 10;

/// Callback invoked once per `ChatEvent` produced by the provider,
/// across every loop iteration of the turn.
pub type EventSink = Arc<dyn Fn(ChatEvent) + Send + Sync>;

pub struct TurnInput {
    pub system: Option<String>,
    pub history: Vec<Message>,
    pub user_message: String,
    pub model: Option<String>,
}

/// Run one full turn: send `input`, forward every event to `on_event`,
/// and loop back into the provider whenever the model asks to call a
/// tool, until it produces a final answer, the cap is hit, or the run
/// is cancelled.
///
/// Returns the full list of messages appended during the turn (the new
/// user message, any assistant/tool_result pairs, and the final
/// assistant message), ready to append to the transcript.
pub async fn run_turn(
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    ctx: Arc<dyn ToolContext>,
    cancel: CancelToken,
    input: TurnInput,
    on_event: EventSink,
) -> Result<Vec<Message>> {
    let mut messages = input.history;
    messages.push(Message::user(input.user_message));
    let mut appended = vec![messages.last().cloned().unwrap()];

    let definitions = tools.definitions_for_context(ctx.as_ref());

    for _loop_index in 0..MAX_TURN_LOOPS {
        if cancel.is_cancelled() {
            on_event(ChatEvent::Error {
                message: "run cancelled".to_string(),
            });
            break;
        }

        let request = ChatRequest {
            system: input.system.clone(),
            messages: messages.clone(),
            tools: definitions.clone(),
            model: input.model.clone(),
            max_tokens: None,
        };

        let mut stream = provider.chat(request).await?;
        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            match &event {
                ChatEvent::Delta { text: chunk } => text.push_str(chunk),
                ChatEvent::ToolCall {
                    name,
                    input,
                    call_id,
                } => tool_calls.push(ToolCall {
                    call_id: call_id.clone(),
                    tool_name: name.clone(),
                    arguments: input.clone(),
                }),
                ChatEvent::Final { .. } | ChatEvent::Error { .. } => {}
            }
            let terminal = event.is_terminal();
            on_event(event);
            if terminal && tool_calls.is_empty() {
                // A `final`/`error` event with no tool calls ends the turn.
                if !text.is_empty() {
                    appended.push(Message::assistant(text.clone()));
                }
                return Ok(appended);
            }
        }

        if tool_calls.is_empty() {
            // Stream ended without an explicit final event and without
            // tool calls — treat the accumulated text as the answer.
            if !text.is_empty() {
                appended.push(Message::assistant(text));
            }
            return Ok(appended);
        }

        let mut assistant_parts = Vec::new();
        if !text.is_empty() {
            assistant_parts.push(ContentPart::Text { text: text.clone() });
        }
        for call in &tool_calls {
            assistant_parts.push(ContentPart::ToolUse {
                id: call.call_id.clone(),
                name: call.tool_name.clone(),
                input: call.arguments.clone(),
            });
        }
        let assistant_message = Message::assistant_tool_use(assistant_parts);
        messages.push(assistant_message.clone());
        appended.push(assistant_message);

        let mut result_parts = Vec::new();
        for call in &tool_calls {
            if cancel.is_cancelled() {
                result_parts.push(ContentPart::ToolResult {
                    tool_use_id: call.call_id.clone(),
                    content: "cancelled".to_string(),
                    is_error: true,
                });
                continue;
            }
            let part = invoke_tool(&tools, ctx.as_ref(), call).await;
            result_parts.push(part);
        }
        let results_message = Message::tool_results(result_parts);
        messages.push(results_message.clone());
        appended.push(results_message);
    }

    on_event(ChatEvent::Error {
        message: format!("turn exceeded the {MAX_TURN_LOOPS}-loop tool-use cap"),
    });
    Ok(appended)
}

async fn invoke_tool(
    tools: &ToolRegistry,
    ctx: &dyn ToolContext,
    call: &ToolCall,
) -> ContentPart {
    let Some(tool) = tools.get(&call.tool_name) else {
        return ContentPart::ToolResult {
            tool_use_id: call.call_id.clone(),
            content: format!("unknown tool '{}'", call.tool_name),
            is_error: true,
        };
    };

    // Approval (when `tool.requires_approval()` and the context isn't
    // auto-approving) is gated by the tool itself inside `execute`, not
    // here — each built-in raises its own one-line summary at the point
    // it knows what it's about to do (the shell command, the browser
    // action list), per the approval request's "created by a tool at
    // invocation time" lifecycle. Gating generically here would mean
    // every approval-requiring call prompts twice.
    match tool.execute(call.arguments.clone(), ctx).await {
        Ok(result) => {
            ctx.record_attachments(&call.tool_name, &result.attachments);
            ContentPart::ToolResult {
                tool_use_id: call.call_id.clone(),
                // Every tool output crosses the redaction boundary (§7)
                // before it can reach the model's next turn or a transcript.
                content: ctx.redact(&result.output),
                is_error: false,
            }
        }
        Err(e) => ContentPart::ToolResult {
            tool_use_id: call.call_id.clone(),
            content: ctx.redact(&e.to_string()),
            is_error: true,
        },
    }
}

/// A run id is just a UUID rendered as a string — kept as a free
/// function so callers don't need to depend on `uuid` directly.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}
