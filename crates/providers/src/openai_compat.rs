//! OpenAI-compatible adapter.
//!
//! Works with OpenAI and any other endpoint that follows the OpenAI chat
//! completions contract (Ollama, vLLM, LM Studio, and similar).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde_json::Value;

use gw_domain::chat::{ChatEvent, Usage};
use gw_domain::config::ProviderConfig;
use gw_domain::error::{Error, Result};
use gw_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};

use crate::traits::{ChatRequest, Provider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth, &cfg.id)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());

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
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = &req.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.extend(req.messages.iter().map(message_to_openai));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }

        body
    }
}

fn message_to_openai(msg: &Message) -> Value {
    match (msg.role, &msg.content) {
        (Role::User, MessageContent::Parts(parts)) if has_tool_result(parts) => {
            tool_results_to_openai(parts)
        }
        (Role::Assistant, _) => assistant_to_openai(msg),
        (Role::User, MessageContent::Text(t)) => {
            serde_json::json!({ "role": "user", "content": t })
        }
        (Role::User, MessageContent::Parts(parts)) => {
            let text = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            serde_json::json!({ "role": "user", "content": text })
        }
    }
}

fn has_tool_result(parts: &[ContentPart]) -> bool {
    parts.iter().any(|p| matches!(p, ContentPart::ToolResult { .. }))
}

/// OpenAI represents each tool result as its own message, unlike
/// Anthropic's single user turn holding every `tool_result` block — a
/// turn with N pending tool calls therefore expands to N messages here.
fn tool_results_to_openai(parts: &[ContentPart]) -> Value {
    let messages: Vec<Value> = parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolResult {
                tool_use_id,
                content,
                ..
            } => Some(serde_json::json!({
                "role": "tool",
                "tool_call_id": tool_use_id,
                "content": content,
            })),
            _ => None,
        })
        .collect();
    // The gateway's turn runner always builds one ContentPart::ToolResult
    // per tool-results message today, so this holds exactly one entry.
    messages.into_iter().next().unwrap_or(Value::Null)
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        }));
                    }
                    ContentPart::ToolResult { .. } => {}
                }
            }
        }
    }

    let mut obj = serde_json::json!({ "role": "assistant" });
    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tool-call fragments arrive keyed by array index, not call id — the id
/// only appears on the first delta for that index. `BTreeMap` keeps
/// finalized calls in index order regardless of arrival order.
struct StreamState {
    tool_calls: BTreeMap<u64, (String, String, String)>,
    usage: Usage,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            tool_calls: BTreeMap::new(),
            usage: Usage::default(),
            done_emitted: false,
        }
    }

    fn finalize(&mut self) -> Vec<Result<ChatEvent>> {
        if self.done_emitted {
            return Vec::new();
        }
        self.done_emitted = true;
        let mut events: Vec<Result<ChatEvent>> = self
            .tool_calls
            .values()
            .map(|(call_id, name, args)| {
                let input: Value =
                    serde_json::from_str(args).unwrap_or_else(|_| serde_json::json!({}));
                Ok(ChatEvent::ToolCall {
                    name: name.clone(),
                    input,
                    call_id: call_id.clone(),
                })
            })
            .collect();
        events.push(Ok(ChatEvent::Final { usage: self.usage }));
        events
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        output_tokens: v.get("completion_tokens")?.as_u64()? as u32,
    })
}

fn parse_sse_data(data: &str, state: &mut StreamState) -> Vec<Result<ChatEvent>> {
    if data.trim() == "[DONE]" {
        return state.finalize();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(usage) = v.get("usage").and_then(parse_usage) {
        state.usage = usage;
    }

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());
    let Some(choice) = choice else {
        return Vec::new();
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let entry = state
                .tool_calls
                .entry(idx)
                .or_insert_with(|| (String::new(), String::new(), String::new()));
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                entry.0 = id.to_string();
            }
            if let Some(name) = tc
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str())
            {
                entry.1 = name.to_string();
            }
            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                entry.2.push_str(args);
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(ChatEvent::Delta {
                text: text.to_string(),
            }));
        }
    }

    if choice.get("finish_reason").and_then(|v| v.as_str()).is_some() {
        events.extend(state.finalize());
    }

    events
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ChatEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&req);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

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
            parse_sse_data(data, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
