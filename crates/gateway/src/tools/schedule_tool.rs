//! Schedule management — the third built-in tool. Lives here rather
//! than in `gw-tools` because it needs direct access to the scheduler
//! engine (arming/disarming timers), not just a store.
//!
//! No approval is required: creating, listing, or cancelling a
//! scheduled job is not itself a side-effecting action against the
//! outside world — the job's own prompt is what triggers tool use,
//! subject to the usual approval gates when it runs.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use gw_domain::error::Result;
use gw_domain::tool::{ToolDefinition, ToolResult};
use gw_tools::{Tool, ToolContext};

use crate::scheduler::{describe_cron, CronSchedule, ScheduledJob, Scheduler, ScheduledJobStore};

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ScheduleInput {
    Create {
        name: String,
        cron: String,
        agent_id: String,
        prompt: String,
    },
    List,
    Get {
        id: Uuid,
    },
    Update {
        id: Uuid,
        #[serde(default)]
        cron: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default)]
        enabled: Option<bool>,
    },
    Delete {
        id: Uuid,
    },
}

/// The scheduler doesn't exist yet when the tool registry is built (its
/// executor needs the fully-assembled application state, which in turn
/// needs the tool registry) — `scheduler` is filled in once, right
/// after the scheduler itself is constructed, and read on every call
/// thereafter.
pub type SchedulerHandle = Arc<OnceLock<Arc<Scheduler>>>;

pub struct ScheduleTool {
    store: Arc<ScheduledJobStore>,
    scheduler: SchedulerHandle,
}

impl ScheduleTool {
    pub fn new(store: Arc<ScheduledJobStore>, scheduler: SchedulerHandle) -> Self {
        Self { store, scheduler }
    }

    fn scheduler(&self) -> &Arc<Scheduler> {
        self.scheduler
            .get()
            .expect("scheduler handle set before any tool call is dispatched")
    }

    fn format_job(job: &ScheduledJob) -> String {
        format!(
            "{} — {} ({}) — {} — next run: {}",
            job.id,
            job.name,
            if job.enabled { "enabled" } else { "disabled" },
            describe_cron(&job.cron),
            job.next_run_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "not scheduled".to_string()),
        )
    }
}

#[async_trait]
impl Tool for ScheduleTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "schedule".to_string(),
            description: "Create, list, update, or delete scheduled agent jobs.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["create", "list", "get", "update", "delete"]
                    },
                    "id": { "type": "string" },
                    "name": { "type": "string" },
                    "cron": { "type": "string" },
                    "agent_id": { "type": "string" },
                    "prompt": { "type": "string" },
                    "enabled": { "type": "boolean" }
                },
                "required": ["action"]
            }),
        }
    }

    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, input: Value, ctx: &dyn ToolContext) -> Result<ToolResult> {
        let input: ScheduleInput = serde_json::from_value(input)
            .map_err(|e| gw_domain::error::Error::InvalidParams(e.to_string()))?;

        let output = match input {
            ScheduleInput::Create {
                name,
                cron,
                agent_id,
                prompt,
            } => {
                CronSchedule::parse(&cron)?;
                let job = ScheduledJob {
                    id: Uuid::new_v4(),
                    name,
                    cron,
                    agent_id,
                    prompt,
                    enabled: true,
                    created_at: Utc::now(),
                    next_run_at: None,
                    last_run_at: None,
                    last_run_status: None,
                    last_run_summary: None,
                };
                let id = job.id;
                self.store.create_job(job)?;
                self.scheduler().arm(id);
                format!("created schedule {id}")
            }
            ScheduleInput::List => {
                let jobs = self.store.list_jobs();
                if jobs.is_empty() {
                    "no scheduled jobs".to_string()
                } else {
                    jobs.iter().map(Self::format_job).collect::<Vec<_>>().join("\n")
                }
            }
            ScheduleInput::Get { id } => match self.store.get_job(id) {
                Some(job) => Self::format_job(&job),
                None => format!("no schedule with id {id}"),
            },
            ScheduleInput::Update {
                id,
                cron,
                prompt,
                enabled,
            } => {
                if let Some(cron) = &cron {
                    CronSchedule::parse(cron)?;
                }
                let job = self.store.update_job(id, |job| {
                    if let Some(cron) = cron {
                        job.cron = cron;
                    }
                    if let Some(prompt) = prompt {
                        job.prompt = prompt;
                    }
                    if let Some(enabled) = enabled {
                        job.enabled = enabled;
                    }
                })?;
                if job.enabled {
                    self.scheduler().arm(id);
                } else {
                    self.scheduler().disarm(id);
                }
                format!("updated schedule {id}")
            }
            ScheduleInput::Delete { id } => {
                self.scheduler().disarm(id);
                self.store.delete_job(id)?;
                format!("deleted schedule {id}")
            }
        };

        ctx.record_exec("schedule");
        Ok(ToolResult {
            output,
            exit_code: None,
            truncated: false,
            attachments: Vec::new(),
        })
    }
}
