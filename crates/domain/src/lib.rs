//! Shared types for the gateway: configuration, the provider-agnostic
//! chat/message model, tool contracts, error taxonomy, and structured
//! trace events.

pub mod chat;
pub mod config;
pub mod error;
pub mod tool;
pub mod trace;

pub use chat::{ChatEvent, Usage};
pub use error::{Error, Result};
pub use tool::{
    Attachment, ApprovalRequest, ContentPart, Message, MessageContent, Role, ToolCall,
    ToolDefinition, ToolResult,
};
pub use trace::TraceEvent;
