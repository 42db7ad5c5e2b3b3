use futures_core::stream::BoxStream;

use gw_domain::chat::ChatEvent;
use gw_domain::error::Result;
use gw_domain::tool::{Message, ToolDefinition};

/// A provider-agnostic chat request.
///
/// The system prompt travels out of band (`system`) rather than as a
/// message with a `system` role — the domain's [`gw_domain::tool::Role`]
/// only has `User`/`Assistant` variants.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Trait every LLM adapter implements.
///
/// `chat` always streams: adapters that only offer a non-streaming API
/// would still need to parse and re-emit a single response as this
/// event sequence, so there is no separate non-streaming entry point to
/// keep in sync.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ChatEvent>>>;

    /// The id this provider was registered under.
    fn provider_id(&self) -> &str;
}
