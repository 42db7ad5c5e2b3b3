//! Persistent store for scheduled jobs and their run history (§4.9/§4.10).
//!
//! JSON-file-backed, mirroring the rest of the gateway's state layout
//! (no embedded SQL database) — an in-memory map guarded by a lock,
//! flushed to `schedules.json` on every mutation. `JobRun` rows cascade
//! delete with their owning job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gw_domain::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: Uuid,
    pub name: String,
    pub cron: String,
    pub agent_id: String,
    pub prompt: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    /// `"success"` or `"error"`, mirroring the matching `JobRun.status`.
    #[serde(default)]
    pub last_run_status: Option<String>,
    #[serde(default)]
    pub last_run_summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    #[serde(rename = "success")]
    Succeeded,
    #[serde(rename = "error")]
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: Uuid,
    pub job_id: Uuid,
    #[serde(rename = "sessionKey")]
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Final assistant text ("(no output)" if the turn produced none), or
    /// `None` while the run is still `Running`.
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    jobs: Vec<ScheduledJob>,
    runs: Vec<JobRun>,
}

pub struct ScheduledJobStore {
    path: PathBuf,
    jobs: RwLock<HashMap<Uuid, ScheduledJob>>,
    runs: RwLock<HashMap<Uuid, JobRun>>,
}

impl ScheduledJobStore {
    pub fn load(state_path: &Path) -> Result<Self> {
        let path = state_path.join("schedules.json");
        let snapshot: Snapshot = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "schedules.json is malformed, starting empty");
                Snapshot::default()
            }),
            Err(_) => Snapshot::default(),
        };

        let jobs = snapshot.jobs.into_iter().map(|j| (j.id, j)).collect();
        let runs = snapshot.runs.into_iter().map(|r| (r.id, r)).collect();

        Ok(Self {
            path,
            jobs: RwLock::new(jobs),
            runs: RwLock::new(runs),
        })
    }

    fn persist(&self) -> Result<()> {
        let jobs: Vec<ScheduledJob> = self.jobs.read().unwrap().values().cloned().collect();
        let runs: Vec<JobRun> = self.runs.read().unwrap().values().cloned().collect();
        let snapshot = Snapshot { jobs, runs };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn create_job(&self, job: ScheduledJob) -> Result<()> {
        self.jobs.write().unwrap().insert(job.id, job);
        self.persist()
    }

    pub fn get_job(&self, id: Uuid) -> Option<ScheduledJob> {
        self.jobs.read().unwrap().get(&id).cloned()
    }

    pub fn list_jobs(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<_> = self.jobs.read().unwrap().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn update_job(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ScheduledJob),
    ) -> Result<ScheduledJob> {
        let updated = {
            let mut jobs = self.jobs.write().unwrap();
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("no scheduled job '{id}'")))?;
            f(job);
            job.clone()
        };
        self.persist()?;
        Ok(updated)
    }

    /// Delete a job and every run that belongs to it.
    pub fn delete_job(&self, id: Uuid) -> Result<()> {
        {
            let mut jobs = self.jobs.write().unwrap();
            if jobs.remove(&id).is_none() {
                return Err(Error::NotFound(format!("no scheduled job '{id}'")));
            }
        }
        self.runs.write().unwrap().retain(|_, run| run.job_id != id);
        self.persist()
    }

    pub fn record_run(&self, run: JobRun) -> Result<()> {
        self.runs.write().unwrap().insert(run.id, run);
        self.persist()
    }

    /// Mark a run as finished, and cascade the same outcome onto its
    /// owning job's `last_run_*` fields (§4.10 step 10/11).
    pub fn finish_run(
        &self,
        id: Uuid,
        status: RunStatus,
        error: Option<String>,
        session_id: Option<Uuid>,
        summary: Option<String>,
    ) -> Result<()> {
        let finished_at = Utc::now();
        let job_id = {
            let mut runs = self.runs.write().unwrap();
            let run = runs
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("no job run '{id}'")))?;
            run.status = status;
            run.error = error.clone();
            run.finished_at = Some(finished_at);
            run.summary = summary.clone();
            if let Some(session_id) = session_id {
                run.session_id = session_id;
            }
            run.job_id
        };
        {
            let mut jobs = self.jobs.write().unwrap();
            if let Some(job) = jobs.get_mut(&job_id) {
                job.last_run_at = Some(finished_at);
                job.last_run_status = Some(
                    match status {
                        RunStatus::Succeeded => "success",
                        RunStatus::Failed => "error",
                        RunStatus::Running => "running",
                    }
                    .to_string(),
                );
                job.last_run_summary = summary.or(error);
            }
        }
        self.persist()
    }

    pub fn runs_for_job(&self, job_id: Uuid) -> Vec<JobRun> {
        let mut runs: Vec<_> = self
            .runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> ScheduledJob {
        ScheduledJob {
            id: Uuid::new_v4(),
            name: "nightly digest".into(),
            cron: "0 2 * * *".into(),
            agent_id: "assistant".into(),
            prompt: "summarize today".into(),
            enabled: true,
            created_at: Utc::now(),
            next_run_at: None,
            last_run_at: None,
            last_run_status: None,
            last_run_summary: None,
        }
    }

    #[test]
    fn create_and_reload_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let job = sample_job();
        let id = job.id;
        {
            let store = ScheduledJobStore::load(tmp.path()).unwrap();
            store.create_job(job).unwrap();
        }
        let reloaded = ScheduledJobStore::load(tmp.path()).unwrap();
        assert!(reloaded.get_job(id).is_some());
    }

    #[test]
    fn delete_job_cascades_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScheduledJobStore::load(tmp.path()).unwrap();
        let job = sample_job();
        let job_id = job.id;
        store.create_job(job).unwrap();
        store
            .record_run(JobRun {
                id: Uuid::new_v4(),
                job_id,
                session_id: Uuid::new_v4(),
                started_at: Utc::now(),
                finished_at: None,
                status: RunStatus::Running,
                error: None,
                summary: None,
            })
            .unwrap();
        assert_eq!(store.runs_for_job(job_id).len(), 1);
        store.delete_job(job_id).unwrap();
        assert_eq!(store.runs_for_job(job_id).len(), 0);
    }

    #[test]
    fn malformed_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("schedules.json"), "not json").unwrap();
        let store = ScheduledJobStore::load(tmp.path()).unwrap();
        assert!(store.list_jobs().is_empty());
    }

    #[test]
    fn finish_run_updates_status() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScheduledJobStore::load(tmp.path()).unwrap();
        let job = sample_job();
        let job_id = job.id;
        store.create_job(job).unwrap();
        let run_id = Uuid::new_v4();
        store
            .record_run(JobRun {
                id: run_id,
                job_id,
                session_id: Uuid::new_v4(),
                started_at: Utc::now(),
                finished_at: None,
                status: RunStatus::Running,
                error: None,
                summary: None,
            })
            .unwrap();
        store
            .finish_run(run_id, RunStatus::Succeeded, None, Some(Uuid::new_v4()), Some("done".into()))
            .unwrap();
        let run = &store.runs_for_job(job_id)[0];
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.finished_at.is_some());
        assert_eq!(run.summary.as_deref(), Some("done"));
        let job = store.get_job(job_id).unwrap();
        assert_eq!(job.last_run_status.as_deref(), Some("success"));
        assert_eq!(job.last_run_summary.as_deref(), Some("done"));
    }

    #[test]
    fn delete_unknown_job_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScheduledJobStore::load(tmp.path()).unwrap();
        assert!(store.delete_job(Uuid::new_v4()).is_err());
    }
}
