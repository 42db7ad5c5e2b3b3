//! The tool contract every built-in (and, eventually, third-party) tool
//! implements, plus the per-call context a tool uses to request
//! approval and report progress back to the caller.

use async_trait::async_trait;
use serde_json::Value;

use gw_domain::error::Result;
use gw_domain::tool::{Attachment, ToolDefinition, ToolResult};

/// Outcome of an approval request raised mid-`execute`.
#[derive(Debug, Clone)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: Option<String> },
}

/// What a tool needs from its caller while it runs: a way to gate a
/// side-effecting action behind human approval, a way to narrate
/// progress back to the UI, and whether approval is already granted for
/// this whole call (scheduled runs set this so unattended jobs never
/// block on a human).
#[async_trait]
pub trait ToolContext: Send + Sync {
    async fn request_approval(
        &self,
        tool_name: &str,
        summary: String,
        details: Value,
    ) -> ApprovalDecision;

    fn report_progress(&self, message: String);

    fn auto_approve(&self) -> bool;

    /// Pass tool output through the secret-redaction boundary (§7) before
    /// it reaches the audit log or the model's next turn.
    fn redact(&self, text: &str) -> String;

    /// Record that this tool ran to completion (kind `tool_exec`, or
    /// `scheduler_run` for an unattended run) — a tool calls this once it
    /// has actually run, after any approval gate has passed.
    fn record_exec(&self, tool_name: &str);

    /// Forward non-text artifacts (screenshots, etc.) as a `tool.attachments`
    /// push event. Default no-op — only contexts wired to a push channel
    /// override it.
    fn record_attachments(&self, _tool_name: &str, _attachments: &[Attachment]) {}
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Whether this tool must pass through `ctx.request_approval` before
    /// it runs (subject to `ctx.auto_approve()` bypassing the gate).
    fn requires_approval(&self) -> bool;

    async fn execute(&self, input: Value, ctx: &dyn ToolContext) -> Result<ToolResult>;
}
