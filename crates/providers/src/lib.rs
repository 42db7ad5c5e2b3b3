//! Provider adapters — translate a neutral chat request into a vendor
//! HTTP call and re-emit its response as the gateway's own
//! [`gw_domain::chat::ChatEvent`] stream.
//!
//! Every adapter speaks its own wire format (Anthropic Messages API,
//! OpenAI-compatible chat completions) but exposes the same
//! [`traits::Provider`] trait, so the agent turn runner never needs to
//! know which vendor it is talking to.

pub mod anthropic;
pub mod openai_compat;
pub mod registry;
mod sse;
pub mod traits;
mod util;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
pub use traits::{ChatRequest, Provider};
