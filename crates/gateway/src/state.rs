//! Shared application state: every long-lived component the transport
//! layer, turn runner, and scheduler executor all need a handle to.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use gw_domain::config::Config;
use gw_domain::error::{Error, Result};
use gw_providers::ProviderRegistry;
use gw_sessions::{SessionStore, TranscriptWriter};
use gw_tools::{ApprovalDecision, ToolContext, ToolRegistry};

use crate::audit::AuditLog;
use crate::runner::{ActiveRuns, ApprovalCoordinator};
use crate::scheduler::{JobExecutor, JobOutcome, ScheduledJob, ScheduledJobStore, Scheduler};
use crate::secrets::SecretFilter;
use crate::transport::rpc::PushEvent;
use crate::workspace::Workspace;

pub struct AppState {
    pub config: Config,
    pub state_path: PathBuf,
    pub sessions: SessionStore,
    pub transcripts: TranscriptWriter,
    pub providers: ProviderRegistry,
    pub tools: Arc<ToolRegistry>,
    pub approvals: Arc<ApprovalCoordinator>,
    pub active_runs: Arc<ActiveRuns>,
    pub audit: AuditLog,
    pub secrets: SecretFilter,
    pub workspace: Workspace,
    pub job_store: Arc<ScheduledJobStore>,
    pub auth_token: String,
    /// Broadcast channel every WebSocket connection subscribes to for
    /// push frames (chat deltas, approval requests, scheduler
    /// completions) correlated by `runId`.
    pub push: broadcast::Sender<PushEvent>,
}

impl AppState {
    pub fn push_event(&self, event: PushEvent) {
        // No subscribers (e.g. between client reconnects) is not an
        // error — the event is simply dropped.
        let _ = self.push.send(event);
    }

    /// Resolve the provider + model for an agent id, falling back
    /// through `agents.provider_fallback_order` when `AGENTS.md` has no
    /// explicit binding or names a provider that isn't registered.
    pub fn resolve_provider(&self, agent_id: &str) -> Result<(Arc<dyn gw_providers::Provider>, Option<String>)> {
        let bindings = self.workspace.agents();
        if let Some(binding) = bindings.get(agent_id) {
            if let Some(provider) = self.providers.get(&binding.provider) {
                return Ok((provider, binding.model.clone()));
            }
        }
        for provider_id in &self.config.agents.provider_fallback_order {
            if let Some(provider) = self.providers.get(provider_id) {
                return Ok((provider, None));
            }
        }
        Err(Error::Config(format!(
            "no provider available for agent '{agent_id}'"
        )))
    }
}

/// Per-call [`ToolContext`] bridging a tool's approval/progress calls
/// back onto the approval coordinator and push channel. `auto_approve`
/// is set for scheduled/unattended runs so they never block on a human.
pub struct RunToolContext {
    pub state: Arc<AppState>,
    pub session_key: String,
    pub run_id: String,
    pub auto_approve: bool,
    /// Set only on the scheduler's execution path; selects the
    /// `scheduler_run` audit kind (§4.10 step 8) instead of `tool_exec`.
    pub job_id: Option<String>,
}

#[async_trait]
impl ToolContext for RunToolContext {
    async fn request_approval(&self, tool_name: &str, summary: String, details: Value) -> ApprovalDecision {
        if self.auto_approve {
            return ApprovalDecision::Approved;
        }

        let approval_id = Uuid::new_v4();
        let rx = self.state.approvals.register(
            approval_id,
            tool_name.to_string(),
            summary.clone(),
            self.session_key.clone(),
            self.run_id.clone(),
        );
        self.state.push_event(PushEvent::ApprovalRequested {
            request: gw_domain::tool::ApprovalRequest {
                approval_id,
                tool_name: tool_name.to_string(),
                summary,
                details,
            },
        });

        let decision = rx.await.unwrap_or(ApprovalDecision::Denied {
            reason: Some("run ended before approval was resolved".to_string()),
        });

        if let ApprovalDecision::Denied { reason } = &decision {
            self.state.audit.record(crate::audit::AuditEvent::ToolDenied {
                session_key: self.session_key.clone(),
                tool_name: tool_name.to_string(),
                call_id: approval_id.to_string(),
                reason: reason.clone(),
            });
        }

        decision
    }

    fn report_progress(&self, message: String) {
        tracing::debug!(run_id = %self.run_id, %message, "tool progress");
        self.state.push_event(PushEvent::ToolProgress {
            run_id: self.run_id.clone(),
            message,
        });
    }

    fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    fn redact(&self, text: &str) -> String {
        self.state.secrets.filter(text)
    }

    fn record_attachments(&self, tool_name: &str, attachments: &[gw_domain::tool::Attachment]) {
        if attachments.is_empty() {
            return;
        }
        self.state.push_event(PushEvent::ToolAttachments {
            run_id: self.run_id.clone(),
            tool: tool_name.to_string(),
            attachments: attachments.to_vec(),
        });
    }

    fn record_exec(&self, tool_name: &str) {
        if let Some(job_id) = &self.job_id {
            self.state.audit.record(crate::audit::AuditEvent::SchedulerRun {
                job_id: job_id.clone(),
                run_id: self.run_id.clone(),
                status: "success".to_string(),
            });
        } else {
            self.state.audit.record(crate::audit::AuditEvent::ToolExec {
                session_key: self.session_key.clone(),
                tool_name: tool_name.to_string(),
                call_id: self.run_id.clone(),
            });
        }
    }
}

/// Prepended to every scheduled run's system prompt (§4.10 step 6) — an
/// unattended run has no human to answer a confirmation question, so the
/// model is told up front that it doesn't need to ask one.
const SCHEDULER_PREAMBLE: &str = "Every tool call you make in this run is already pre-approved. \
Do not ask the user for confirmation before calling a tool — just call it.";

/// Reasserted once (§4.10 step 9) if the model's first response reads
/// like it's waiting on a confirmation that will never come.
const APPROVAL_RETRY_MESSAGE: &str = "Reminder: this is an unattended scheduled run and every \
tool call is pre-approved. Do not ask for confirmation — call the tool directly and continue.";

const APPROVAL_LOOKING_PHRASES: [&str; 5] = ["approve", "approval", "proceed", "permission", "confirm"];

fn looks_like_approval_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    APPROVAL_LOOKING_PHRASES.iter().any(|p| lower.contains(p))
}

fn turn_made_tool_calls(messages: &[gw_domain::tool::Message]) -> bool {
    messages.iter().any(|m| match &m.content {
        gw_domain::tool::MessageContent::Parts(parts) => parts
            .iter()
            .any(|p| matches!(p, gw_domain::tool::ContentPart::ToolUse { .. })),
        gw_domain::tool::MessageContent::Text(_) => false,
    })
}

fn final_assistant_text(messages: &[gw_domain::tool::Message]) -> Option<String> {
    messages.iter().rev().find_map(|m| {
        if m.role != gw_domain::tool::Role::Assistant {
            return None;
        }
        let text = m.content.extract_all_text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    })
}

/// Executes one scheduled job's firing (§4.10's `executeJob`): create a
/// session, resolve the job's agent binding, run a turn with
/// `autoApprove = true`, and persist the transcript.
pub struct SchedulerExecutor {
    pub state: Arc<AppState>,
}

#[async_trait]
impl JobExecutor for SchedulerExecutor {
    async fn execute(&self, job: ScheduledJob, run_id: Uuid) -> std::result::Result<JobOutcome, String> {
        let state = &self.state;
        let session = state.sessions.create(job.agent_id.clone()).map_err(|e| e.to_string())?;

        let (provider, model) = state
            .resolve_provider(&job.agent_id)
            .map_err(|e| e.to_string())?;

        let mut system = state.workspace.base_system_prompt();
        if let Some(overlay) = state.workspace.scheduler_overlay() {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&overlay);
        }
        let system = format!("{SCHEDULER_PREAMBLE}\n\n{system}");

        let ctx: Arc<dyn ToolContext> = Arc::new(RunToolContext {
            state: Arc::clone(state),
            session_key: session.id.to_string(),
            run_id: run_id.to_string(),
            auto_approve: true,
            job_id: Some(job.id.to_string()),
        });

        let run_id_str = run_id.to_string();
        let state_for_sink = Arc::clone(state);
        let sink_run_id = run_id_str.clone();
        let on_event: crate::runner::EventSink = Arc::new(move |event| {
            if let Some(push) = PushEvent::from_chat_event(&sink_run_id, &event) {
                state_for_sink.push_event(push);
            }
        });

        let cancel = state.active_runs.register(run_id_str.clone());

        let mut result = crate::runner::run_turn(
            Arc::clone(&provider),
            Arc::clone(&state.tools),
            Arc::clone(&ctx),
            cancel.clone(),
            crate::runner::TurnInput {
                system: Some(system.clone()),
                history: Vec::new(),
                user_message: job.prompt.clone(),
                model: model.clone(),
            },
            on_event.clone(),
        )
        .await;

        if let Ok(turn_messages) = &result {
            let reads_like_approval_request = final_assistant_text(turn_messages)
                .map(|text| looks_like_approval_request(&text))
                .unwrap_or(false);
            if reads_like_approval_request && !turn_made_tool_calls(turn_messages) {
                result = crate::runner::run_turn(
                    provider,
                    Arc::clone(&state.tools),
                    ctx,
                    cancel,
                    crate::runner::TurnInput {
                        system: Some(system),
                        history: turn_messages.clone(),
                        user_message: APPROVAL_RETRY_MESSAGE.to_string(),
                        model,
                    },
                    on_event,
                )
                .await;
            }
        }

        state.active_runs.remove(&run_id_str);

        match result {
            Ok(messages) => {
                let lines: Vec<_> = messages
                    .iter()
                    .map(|m| {
                        let content = serde_json::to_string(&m.content).unwrap_or_default();
                        gw_sessions::TranscriptWriter::line(
                            match m.role {
                                gw_domain::tool::Role::User => "user",
                                gw_domain::tool::Role::Assistant => "assistant",
                            },
                            &content,
                        )
                    })
                    .collect();
                let session_id = session.id.to_string();
                if let Err(e) = state.transcripts.append(&session_id, &lines) {
                    tracing::warn!(error = %e, "failed to persist scheduled-run transcript");
                }
                if let Err(e) = state.sessions.touch(session.id) {
                    tracing::warn!(error = %e, "failed to update session timestamp");
                }
                let summary = final_assistant_text(&messages).unwrap_or_else(|| "(no output)".to_string());
                state.push_event(PushEvent::SchedulerRunCompleted {
                    job_id: job.id.to_string(),
                    job_name: job.name.clone(),
                    run_id: run_id_str,
                    session_key: Some(session.id.to_string()),
                    status: "success".to_string(),
                    summary: Some(summary.clone()),
                    error: None,
                });
                Ok(JobOutcome {
                    session_id: session.id,
                    summary: Some(summary),
                })
            }
            Err(e) => {
                state.push_event(PushEvent::SchedulerRunCompleted {
                    job_id: job.id.to_string(),
                    job_name: job.name.clone(),
                    run_id: run_id_str,
                    session_key: Some(session.id.to_string()),
                    status: "error".to_string(),
                    summary: None,
                    error: Some(e.to_string()),
                });
                Err(e.to_string())
            }
        }
    }
}

pub struct AppStateBuilder;

impl AppStateBuilder {
    /// Assemble the full application state from a state directory: load
    /// config, providers, sessions, tools, and the scheduler store, wire
    /// the scheduler's executor back onto this same state, and arm every
    /// enabled job's timer.
    pub fn build(state_path: PathBuf) -> Result<(Arc<AppState>, Arc<Scheduler>)> {
        let config = crate::config_loader::load_config(&state_path)?;
        let auth_token = crate::config_loader::load_auth_token()
            .ok_or_else(|| Error::Config("GATEWAY_AUTH_TOKEN is not set".to_string()))?;

        let sessions = SessionStore::new(&state_path)?;
        let transcripts = TranscriptWriter::new(&state_path.join("transcripts"));
        let providers = ProviderRegistry::from_config(&config.llm)?;
        let job_store = Arc::new(ScheduledJobStore::load(&state_path)?);
        let workspace = Workspace::new(state_path.join("workspace"));
        let audit = AuditLog::new(&state_path, config.security.audit_log);
        let secrets = SecretFilter::new(config.security.secrets_filter, vec![auth_token.clone()]);

        let scheduler_handle: crate::tools::schedule_tool::SchedulerHandle =
            Arc::new(std::sync::OnceLock::new());

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(gw_tools::ShellTool::new(
            config.tools.timeout,
            config.tools.max_output_bytes,
            Vec::new(),
        )));
        tools.register(Arc::new(gw_tools::BrowserTool::new()));
        tools.register(Arc::new(crate::tools::ScheduleTool::new(
            Arc::clone(&job_store),
            Arc::clone(&scheduler_handle),
        )));
        let tools = Arc::new(tools);

        let (push, _) = broadcast::channel(1024);

        let state = Arc::new(AppState {
            config,
            state_path,
            sessions,
            transcripts,
            providers,
            tools,
            approvals: Arc::new(ApprovalCoordinator::new()),
            active_runs: Arc::new(ActiveRuns::new()),
            audit,
            secrets,
            workspace,
            job_store: Arc::clone(&job_store),
            auth_token,
            push,
        });

        let executor = Arc::new(SchedulerExecutor {
            state: Arc::clone(&state),
        });
        let scheduler = Scheduler::new(job_store, executor);
        scheduler_handle
            .set(Arc::clone(&scheduler))
            .map_err(|_| ())
            .expect("scheduler handle set exactly once during startup");
        scheduler.start();

        Ok((state, scheduler))
    }
}
