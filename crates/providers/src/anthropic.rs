//! Anthropic-native adapter.
//!
//! Speaks the Anthropic Messages API, including tool use and streaming.
//! System prompts go in a top-level `system` field rather than as a
//! message in the list.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde_json::Value;

use gw_domain::chat::{ChatEvent, Usage};
use gw_domain::config::ProviderConfig;
use gw_domain::error::{Error, Result};
use gw_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};

use crate::traits::{ChatRequest, Provider};
use crate::util::{from_reqwest, resolve_api_key};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth, &cfg.id)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let messages: Vec<Value> = req.messages.iter().map(message_to_anthropic).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "max_tokens": req.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = &req.system {
            body["system"] = Value::String(system.clone());
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

fn message_to_anthropic(msg: &Message) -> Value {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({ "role": role, "content": t }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts.iter().map(content_part_to_anthropic).collect();
            serde_json::json!({ "role": role, "content": content })
        }
    }
}

fn content_part_to_anthropic(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
        ContentPart::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentPart::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tool-use blocks stream as `input_json_delta` fragments keyed by content
/// block index; they only become a usable [`ChatEvent::ToolCall`] once
/// `content_block_stop` closes the block.
struct StreamState {
    active_tool_calls: HashMap<u64, (String, String, String)>,
    usage: Usage,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            active_tool_calls: HashMap::new(),
            usage: Usage::default(),
            done_emitted: false,
        }
    }
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<ChatEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    match v.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "message_start" => {
            if let Some(input_tokens) = v
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(|u| u.get("input_tokens"))
                .and_then(|n| n.as_u64())
            {
                state.usage.input_tokens = input_tokens as u32;
            }
        }

        "content_block_start" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    let call_id = block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    state
                        .active_tool_calls
                        .insert(idx, (call_id, name, String::new()));
                }
            }
        }

        "content_block_delta" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let Some(delta) = v.get("delta") else {
                return events;
            };
            match delta.get("type").and_then(|v| v.as_str()).unwrap_or("") {
                "text_delta" => {
                    if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                        if !text.is_empty() {
                            events.push(Ok(ChatEvent::Delta {
                                text: text.to_string(),
                            }));
                        }
                    }
                }
                "input_json_delta" => {
                    if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                        if let Some(tc) = state.active_tool_calls.get_mut(&idx) {
                            tc.2.push_str(partial);
                        }
                    }
                }
                _ => {}
            }
        }

        "content_block_stop" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some((call_id, tool_name, args_str)) = state.active_tool_calls.remove(&idx) {
                // An unparseable accumulated fragment still produces a
                // tool call, with empty arguments, rather than silently
                // dropping the model's request to invoke the tool.
                let input: Value =
                    serde_json::from_str(&args_str).unwrap_or_else(|_| serde_json::json!({}));
                events.push(Ok(ChatEvent::ToolCall {
                    name: tool_name,
                    input,
                    call_id,
                }));
            }
        }

        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(|n| n.as_u64())
            {
                state.usage.output_tokens = output as u32;
            }
        }

        "message_stop" => {
            if !state.done_emitted {
                state.done_emitted = true;
                events.push(Ok(ChatEvent::Final { usage: state.usage }));
            }
        }

        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            state.done_emitted = true;
            events.push(Ok(ChatEvent::Error { message }));
        }

        // `ping` and any future event type this adapter doesn't recognize.
        _ => {}
    }

    events
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ChatEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&req);

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_anthropic_sse(data, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
