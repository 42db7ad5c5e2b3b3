//! Scheduler engine (§4.10): owns one timer per enabled job, runs at
//! most one execution per job at a time, and re-arms the timer for the
//! job's next occurrence after each run.
//!
//! Deliberately does **not** implement missed-occurrence catch-up: a job
//! whose process was down across one or more scheduled firings simply
//! picks up from "now" when the process restarts and the timer is
//! re-armed from `next_after(Utc::now())`. No `MissedPolicy`, no
//! replay queue.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Duration as TokioDuration;
use uuid::Uuid;

use super::cron::CronSchedule;
use super::store::{RunStatus, ScheduledJob, ScheduledJobStore};

/// A relay timer re-checks in at most this long — `tokio::time::sleep`
/// takes a `Duration`, which on some platforms has practical caps far
/// below "years"; re-arming in chunks keeps a multi-month delay honest
/// without requiring a huge single sleep.
const MAX_SLEEP: TokioDuration = TokioDuration::from_secs(60 * 60 * 24 * 24); // ~24 days

/// What a successful firing produced: the real session it ran in (so the
/// run row can be corrected from the placeholder id the engine inserts
/// before the session exists) and a human-readable summary of the turn.
pub struct JobOutcome {
    pub session_id: Uuid,
    pub summary: Option<String>,
}

/// Executes one firing of a job. Implemented by `AppState` (or a
/// wrapper around it) so the engine itself stays free of provider,
/// session, and tool-registry wiring.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: ScheduledJob, run_id: Uuid) -> std::result::Result<JobOutcome, String>;
}

pub struct Scheduler {
    store: Arc<ScheduledJobStore>,
    executor: Arc<dyn JobExecutor>,
    timers: Mutex<std::collections::HashMap<Uuid, JoinHandle<()>>>,
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl Scheduler {
    pub fn new(store: Arc<ScheduledJobStore>, executor: Arc<dyn JobExecutor>) -> Arc<Self> {
        Arc::new(Self {
            store,
            executor,
            timers: Mutex::new(std::collections::HashMap::new()),
            active: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Arm (or re-arm) every enabled job's timer. Call once at startup.
    pub fn start(self: &Arc<Self>) {
        for job in self.store.list_jobs() {
            if job.enabled {
                self.arm(job.id);
            }
        }
    }

    pub fn arm(self: &Arc<Self>, job_id: Uuid) {
        let Some(job) = self.store.get_job(job_id) else {
            return;
        };
        if !job.enabled {
            return;
        }
        let Ok(schedule) = CronSchedule::parse(&job.cron) else {
            tracing::warn!(job = %job_id, cron = %job.cron, "not arming job with unparseable cron");
            return;
        };
        let Ok(next) = schedule.next_after(Utc::now()) else {
            tracing::warn!(job = %job_id, "cron never fires again, not arming");
            return;
        };
        let _ = self.store.update_job(job_id, |j| j.next_run_at = Some(next));

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.wait_then_fire(job_id, next).await;
        });

        if let Some(old) = self.timers.lock().unwrap().insert(job_id, handle) {
            old.abort();
        }
    }

    pub fn disarm(&self, job_id: Uuid) {
        if let Some(handle) = self.timers.lock().unwrap().remove(&job_id) {
            handle.abort();
        }
    }

    async fn wait_then_fire(self: Arc<Self>, job_id: Uuid, at: chrono::DateTime<Utc>) {
        loop {
            let remaining = at - Utc::now();
            let remaining_std = match remaining.to_std() {
                Ok(d) => d,
                Err(_) => break, // already due
            };
            if remaining_std <= MAX_SLEEP {
                tokio::time::sleep(remaining_std).await;
                break;
            }
            tokio::time::sleep(MAX_SLEEP).await;
        }
        self.fire(job_id).await;
    }

    async fn fire(self: &Arc<Self>, job_id: Uuid) {
        let Some(job) = self.store.get_job(job_id) else {
            return;
        };
        if !job.enabled {
            return;
        }

        // Singleflight: a job whose previous firing hasn't finished is
        // skipped for this occurrence rather than queued or stacked.
        {
            let mut active = self.active.lock().unwrap();
            if active.contains(&job_id) {
                tracing::warn!(job = %job_id, "previous run still in flight, skipping this occurrence");
                self.arm(job_id);
                return;
            }
            active.insert(job_id);
        }

        let run_id = Uuid::new_v4();
        // The real session doesn't exist until the executor creates one;
        // the run row is seeded with a nil placeholder and corrected by
        // `finish_run` once the executor returns (or left nil on error,
        // since no session was ever created in that case).
        let _ = self.store.record_run(super::store::JobRun {
            id: run_id,
            job_id,
            session_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            error: None,
            summary: None,
        });

        let result = self.executor.execute(job.clone(), run_id).await;
        let (status, error, session_id, summary) = match &result {
            Ok(outcome) => (RunStatus::Succeeded, None, Some(outcome.session_id), outcome.summary.clone()),
            Err(e) => (RunStatus::Failed, Some(e.clone()), None, None),
        };
        let _ = self.store.finish_run(run_id, status, error, session_id, summary);

        self.active.lock().unwrap().remove(&job_id);
        self.arm(job_id);
    }

    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.active.lock().unwrap().contains(&job_id)
    }
}
