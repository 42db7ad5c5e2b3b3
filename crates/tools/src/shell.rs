//! Shell execution tool.
//!
//! Spawns the approved command through a single shell interpreter,
//! `sh -c <command>`, exactly as the model produced it — the string is
//! never rebuilt or re-escaped on the server side. Output is merged
//! stdout+stderr, bounded, and the process is given a grace period
//! before being force-killed on timeout.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use gw_domain::error::{Error, Result};
use gw_domain::tool::{ToolDefinition, ToolResult};

use crate::tool::{ApprovalDecision, Tool, ToolContext};

/// Grace period between the polite termination signal and the forceful
/// one, per the shell tool's timeout-escalation contract.
const KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ShellInput {
    command: String,
    #[serde(rename = "workingDir", default)]
    working_dir: Option<String>,
}

pub struct ShellTool {
    timeout: Duration,
    max_output_bytes: usize,
    /// Environment variable names known to carry a credential (provider
    /// API keys, the gateway's own auth token) — stripped in addition to
    /// the generic `_KEY`/`_SECRET`/`_TOKEN`/`_PASSWORD`/`_CREDENTIAL`
    /// suffix pattern.
    credential_env_names: Vec<String>,
    suffix_pattern: Regex,
}

impl ShellTool {
    pub fn new(timeout_ms: u64, max_output_bytes: usize, credential_env_names: Vec<String>) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_output_bytes,
            credential_env_names,
            suffix_pattern: Regex::new(r"(?i)_(KEY|SECRET|TOKEN|PASSWORD|CREDENTIAL)$")
                .expect("static regex is valid"),
        }
    }

    fn filtered_env(&self) -> Vec<(String, String)> {
        let known: HashSet<String> = self
            .credential_env_names
            .iter()
            .map(|s| s.to_ascii_uppercase())
            .collect();
        std::env::vars()
            .filter(|(k, _)| {
                !known.contains(&k.to_ascii_uppercase()) && !self.suffix_pattern.is_match(k)
            })
            .collect()
    }
}

async fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
fn sigterm_group(pid: u32) {
    // SAFETY: `pid` came from a just-spawned child placed in its own
    // process group (`process_group(0)`); `kill(-pid, ...)` targets that
    // whole group so grandchildren are reaped too.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGTERM);
    }
}

#[cfg(unix)]
fn sigkill_group(pid: u32) {
    // SAFETY: same rationale as `sigterm_group`.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "bash".into(),
            description: "Run a shell command on the local machine and return its output."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to run via sh -c" },
                    "workingDir": { "type": "string", "description": "Working directory; defaults to the gateway's own cwd" },
                },
                "required": ["command"],
            }),
        }
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, ctx: &dyn ToolContext) -> Result<ToolResult> {
        let input: ShellInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidParams(format!("shell: {e}")))?;
        if input.command.trim().is_empty() {
            return Err(Error::InvalidParams("shell: command must not be empty".into()));
        }

        if !ctx.auto_approve() {
            let decision = ctx
                .request_approval(
                    "bash",
                    input.command.clone(),
                    serde_json::json!({ "command": input.command, "workingDir": input.working_dir }),
                )
                .await;
            if let ApprovalDecision::Denied { reason } = decision {
                let output = match reason {
                    Some(r) => format!("Command denied by user: {r}"),
                    None => "Command denied by user".to_string(),
                };
                return Ok(ToolResult {
                    output,
                    exit_code: Some(1),
                    truncated: false,
                    attachments: vec![],
                });
            }
        }

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&input.command);
        if let Some(dir) = &input.working_dir {
            cmd.current_dir(dir);
        }
        cmd.env_clear();
        for (k, v) in self.filtered_env() {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                ctx.record_exec("bash");
                return Ok(ToolResult {
                    output: format!("Failed to spawn process: {e}"),
                    exit_code: Some(1),
                    truncated: false,
                    attachments: vec![],
                });
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(stdout, tx.clone()));
        tokio::spawn(pump(stderr, tx));

        let (exit_code, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(_)) => (None, false),
            Err(_) => {
                #[cfg(unix)]
                if let Some(pid) = pid {
                    sigterm_group(pid);
                }
                #[cfg(not(unix))]
                let _ = child.start_kill();

                tokio::time::sleep(KILL_GRACE).await;

                #[cfg(unix)]
                if let Some(pid) = pid {
                    sigkill_group(pid);
                }
                #[cfg(not(unix))]
                let _ = child.start_kill();

                let status = child.wait().await.ok();
                (status.and_then(|s| s.code()), true)
            }
        };

        let mut buf: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = rx.recv().await {
            if truncated {
                continue;
            }
            if buf.len() + chunk.len() > self.max_output_bytes {
                let remaining = self.max_output_bytes.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..remaining]);
                truncated = true;
            } else {
                buf.extend_from_slice(&chunk);
            }
        }

        ctx.record_exec("bash");
        Ok(ToolResult {
            output: String::from_utf8_lossy(&buf).into_owned(),
            exit_code: exit_code.or(if timed_out { Some(-1) } else { None }),
            truncated,
            attachments: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AutoApproveCtx;

    #[async_trait]
    impl ToolContext for AutoApproveCtx {
        async fn request_approval(
            &self,
            _tool_name: &str,
            _summary: String,
            _details: Value,
        ) -> ApprovalDecision {
            ApprovalDecision::Approved
        }
        fn report_progress(&self, _message: String) {}
        fn auto_approve(&self) -> bool {
            true
        }
        fn redact(&self, text: &str) -> String {
            text.to_string()
        }
        fn record_exec(&self, _tool_name: &str) {}
    }

    struct DenyCtx;

    #[async_trait]
    impl ToolContext for DenyCtx {
        async fn request_approval(
            &self,
            _tool_name: &str,
            _summary: String,
            _details: Value,
        ) -> ApprovalDecision {
            ApprovalDecision::Denied {
                reason: Some("not now".into()),
            }
        }
        fn report_progress(&self, _message: String) {}
        fn auto_approve(&self) -> bool {
            false
        }
        fn redact(&self, text: &str) -> String {
            text.to_string()
        }
        fn record_exec(&self, _tool_name: &str) {}
    }

    fn tool() -> ShellTool {
        ShellTool::new(5_000, 1024, vec!["ANTHROPIC_API_KEY".into()])
    }

    #[tokio::test]
    async fn runs_command_and_captures_output() {
        let result = tool()
            .execute(serde_json::json!({ "command": "echo hi" }), &AutoApproveCtx)
            .await
            .unwrap();
        assert_eq!(result.output.trim(), "hi");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported() {
        let result = tool()
            .execute(serde_json::json!({ "command": "exit 7" }), &AutoApproveCtx)
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(7));
    }

    #[tokio::test]
    async fn denial_short_circuits_without_spawning() {
        let result = tool()
            .execute(serde_json::json!({ "command": "echo should-not-run" }), &DenyCtx)
            .await
            .unwrap();
        assert!(result.output.contains("denied by user"));
        assert!(result.output.contains("not now"));
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = tool()
            .execute(serde_json::json!({ "command": "   " }), &AutoApproveCtx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[tokio::test]
    async fn output_past_limit_is_truncated() {
        let result = ShellTool::new(5_000, 4, vec![])
            .execute(serde_json::json!({ "command": "echo 0123456789" }), &AutoApproveCtx)
            .await
            .unwrap();
        assert!(result.truncated);
        assert_eq!(result.output.len(), 4);
    }

    #[tokio::test]
    async fn credential_env_vars_are_not_visible_to_the_command() {
        std::env::set_var("GW_SHELL_TEST_SECRET_TOKEN", "s3cr3t");
        let result = tool()
            .execute(
                serde_json::json!({ "command": "echo $GW_SHELL_TEST_SECRET_TOKEN" }),
                &AutoApproveCtx,
            )
            .await
            .unwrap();
        std::env::remove_var("GW_SHELL_TEST_SECRET_TOKEN");
        assert_eq!(result.output.trim(), "");
    }
}
