//! JSON-RPC method dispatch table (§6).
//!
//! Each handler receives the already-parsed `params` value and returns
//! either a JSON `result` or a domain [`gw_domain::error::Error`], which
//! the caller turns into an RPC error response via its `rpc_code()`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use gw_domain::error::{Error, Result};

use crate::runner::TurnInput;
use crate::state::{AppState, RunToolContext};
use crate::transport::rpc::PushEvent;

pub async fn dispatch(state: &Arc<AppState>, method: &str, params: Value) -> Result<Value> {
    match method {
        "health.check" => health_check(state),
        "agents.list" => agents_list(state),
        "sessions.create" => sessions_create(state, params),
        "sessions.list" => sessions_list(state),
        "sessions.get" => sessions_get(state, params),
        "chat.send" => chat_send(state, params).await,
        "chat.history" => chat_history(state, params),
        "chat.abort" => chat_abort(state, params),
        "exec.approve" => exec_approve(state, params),
        "exec.deny" => exec_deny(state, params),
        "memory.search" => Ok(json!({ "results": [] })),
        "scheduler.list" => scheduler_list(state, params),
        "scheduler.get" => scheduler_get(state, params),
        "scheduler.runs" => scheduler_runs(state, params),
        other => Err(Error::UnknownMethod(other.to_string())),
    }
}

fn health_check(_state: &Arc<AppState>) -> Result<Value> {
    Ok(json!({ "status": "ok" }))
}

fn agents_list(state: &Arc<AppState>) -> Result<Value> {
    let agents: Vec<Value> = state
        .workspace
        .agents()
        .into_values()
        .map(|a| {
            json!({
                "id": a.id,
                "model": a.model,
                "description": a.description,
            })
        })
        .collect();
    Ok(json!({ "agents": agents }))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SessionsCreateParams {
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

fn sessions_create(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: SessionsCreateParams = parse_params(params)?;
    let agent_id = params.agent_id.unwrap_or_else(|| state.config.agents.default.clone());
    let meta = state.sessions.create(agent_id)?;
    Ok(json!({ "sessionKey": meta.id, "meta": meta }))
}

fn sessions_list(state: &Arc<AppState>) -> Result<Value> {
    Ok(json!({ "sessions": state.sessions.list() }))
}

#[derive(Deserialize)]
struct SessionKeyParams {
    #[serde(rename = "sessionKey")]
    session_key: Uuid,
}

fn sessions_get(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: SessionKeyParams = parse_params(params)?;
    let session = state
        .sessions
        .get(params.session_key)
        .ok_or_else(|| Error::NotFound(format!("no session '{}'", params.session_key)))?;
    let messages = state.transcripts.read(&params.session_key.to_string())?;
    Ok(json!({ "session": session, "messages": messages }))
}

#[derive(Deserialize)]
struct ChatSendParams {
    #[serde(rename = "sessionKey")]
    session_key: Uuid,
    message: String,
}

async fn chat_send(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: ChatSendParams = parse_params(params)?;
    if params.message.is_empty() || params.message.len() > 32_000 {
        return Err(Error::InvalidParams(
            "message must be 1..32000 characters".to_string(),
        ));
    }
    let session = state
        .sessions
        .get(params.session_key)
        .ok_or_else(|| Error::NotFound(format!("no session '{}'", params.session_key)))?;

    let (provider, model) = state.resolve_provider(&session.agent_id)?;

    let history: Vec<gw_domain::tool::Message> = state
        .transcripts
        .read(&session.id.to_string())?
        .into_iter()
        .filter_map(transcript_line_to_message)
        .collect();

    let run_id = crate::runner::turn::new_run_id();
    let cancel = state.active_runs.register(run_id.clone());

    let ctx = Arc::new(RunToolContext {
        state: Arc::clone(state),
        session_key: session.id.to_string(),
        run_id: run_id.clone(),
        auto_approve: false,
        job_id: None,
    });

    let state_for_sink = Arc::clone(state);
    let sink_run_id = run_id.clone();
    let on_event: crate::runner::EventSink = Arc::new(move |event| {
        if let Some(push) = PushEvent::from_chat_event(&sink_run_id, &event) {
            state_for_sink.push_event(push);
        }
    });

    let state_for_task = Arc::clone(state);
    let task_run_id = run_id.clone();
    let session_id = session.id;
    let system = {
        let s = state.workspace.base_system_prompt();
        if s.is_empty() { None } else { Some(s) }
    };

    tokio::spawn(async move {
        let result = crate::runner::run_turn(
            provider,
            Arc::clone(&state_for_task.tools),
            ctx,
            cancel,
            TurnInput {
                system,
                history,
                user_message: params.message,
                model,
            },
            on_event,
        )
        .await;

        state_for_task.active_runs.remove(&task_run_id);

        if let Ok(messages) = result {
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
            let session_id_str = session_id.to_string();
            if let Err(e) = state_for_task.transcripts.append(&session_id_str, &lines) {
                tracing::warn!(error = %e, "failed to persist chat transcript");
            }
            let _ = state_for_task.sessions.touch(session_id);
        }
    });

    Ok(json!({ "runId": run_id }))
}

fn transcript_line_to_message(line: gw_sessions::TranscriptLine) -> Option<gw_domain::tool::Message> {
    use gw_domain::tool::{Message, MessageContent, Role};
    let role = match line.role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };
    let content: MessageContent = serde_json::from_str(&line.content)
        .unwrap_or(MessageContent::Text(line.content.clone()));
    Some(Message { role, content })
}

#[derive(Deserialize)]
struct ChatHistoryParams {
    #[serde(rename = "sessionKey")]
    session_key: Uuid,
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    100
}

fn chat_history(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: ChatHistoryParams = parse_params(params)?;
    if !(1..=500).contains(&params.limit) {
        return Err(Error::InvalidParams("limit must be 1..500".to_string()));
    }
    let mut messages = state.transcripts.read(&params.session_key.to_string())?;
    if messages.len() > params.limit {
        let start = messages.len() - params.limit;
        messages = messages.split_off(start);
    }
    Ok(json!({ "messages": messages }))
}

#[derive(Deserialize)]
struct RunIdParams {
    #[serde(rename = "runId")]
    run_id: Uuid,
}

fn chat_abort(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: RunIdParams = parse_params(params)?;
    state.active_runs.cancel(&params.run_id.to_string());
    Ok(json!({ "ok": true }))
}

#[derive(Deserialize)]
struct ApprovalIdParams {
    #[serde(rename = "approvalId")]
    approval_id: Uuid,
}

fn exec_approve(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: ApprovalIdParams = parse_params(params)?;
    state.approvals.resolve(params.approval_id)?;
    Ok(json!({ "ok": true }))
}

#[derive(Deserialize)]
struct ExecDenyParams {
    #[serde(rename = "approvalId")]
    approval_id: Uuid,
    reason: Option<String>,
}

fn exec_deny(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: ExecDenyParams = parse_params(params)?;
    state.approvals.reject(params.approval_id, params.reason)?;
    Ok(json!({ "ok": true }))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SchedulerListParams {
    #[serde(rename = "enabledOnly")]
    enabled_only: Option<bool>,
}

fn scheduler_list(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: SchedulerListParams = parse_params(params)?;
    let jobs: Vec<_> = state
        .job_store
        .list_jobs()
        .into_iter()
        .filter(|j| !params.enabled_only.unwrap_or(false) || j.enabled)
        .collect();
    Ok(json!({ "jobs": jobs }))
}

#[derive(Deserialize)]
struct SchedulerGetParams {
    id: Uuid,
}

fn scheduler_get(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: SchedulerGetParams = parse_params(params)?;
    let job = state
        .job_store
        .get_job(params.id)
        .ok_or_else(|| Error::NotFound(format!("no scheduled job '{}'", params.id)))?;
    Ok(json!({ "job": job }))
}

#[derive(Deserialize)]
struct SchedulerRunsParams {
    #[serde(rename = "jobId")]
    job_id: Uuid,
    #[serde(default = "default_runs_limit")]
    limit: usize,
}

fn default_runs_limit() -> usize {
    20
}

fn scheduler_runs(state: &Arc<AppState>, params: Value) -> Result<Value> {
    let params: SchedulerRunsParams = parse_params(params)?;
    if !(1..=100).contains(&params.limit) {
        return Err(Error::InvalidParams("limit must be 1..100".to_string()));
    }
    let mut runs = state.job_store.runs_for_job(params.job_id);
    if runs.len() > params.limit {
        let start = runs.len() - params.limit;
        runs = runs.split_off(start);
    }
    Ok(json!({ "runs": runs }))
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(e.to_string()))
}
