//! Cron parsing, the scheduled-job store, and the scheduler engine
//! (§4.9/§4.10).

pub mod cron;
pub mod engine;
pub mod store;

pub use cron::{describe_cron, CronSchedule};
pub use engine::{JobExecutor, JobOutcome, Scheduler};
pub use store::{JobRun, RunStatus, ScheduledJob, ScheduledJobStore};
