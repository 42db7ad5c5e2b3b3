//! Append-only structured audit log (`audit.jsonl`, §6/§7).
//!
//! One JSON line per event. Writes are best-effort: a failure to write
//! is logged but never propagated — the audit log must never cascade a
//! failure into the request/turn it is recording (§7).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    ToolExec {
        session_key: String,
        tool_name: String,
        call_id: String,
    },
    ToolDenied {
        session_key: String,
        tool_name: String,
        call_id: String,
        reason: Option<String>,
    },
    SchedulerRun {
        job_id: String,
        run_id: String,
        status: String,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

pub struct AuditLog {
    path: Option<PathBuf>,
    file: Mutex<Option<std::fs::File>>,
}

impl AuditLog {
    /// `enabled = false` (the `security.auditLog` config option) builds
    /// a no-op log: `record` becomes a cheap no-op rather than opening
    /// any file.
    pub fn new(state_path: &std::path::Path, enabled: bool) -> Self {
        if !enabled {
            return Self {
                path: None,
                file: Mutex::new(None),
            };
        }
        let path = state_path.join("audit.jsonl");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok();
        if file.is_none() {
            tracing::warn!(path = %path.display(), "failed to open audit log, disabling");
        }
        Self {
            path: Some(path),
            file: Mutex::new(file),
        }
    }

    pub fn record(&self, event: AuditEvent) {
        if self.path.is_none() {
            return;
        }
        let record = Record {
            timestamp: Utc::now().to_rfc3339(),
            event: &event,
        };
        let Ok(mut line) = serde_json::to_string(&record) else {
            return;
        };
        line.push('\n');

        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()) {
                tracing::warn!(error = %e, "audit log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_append_as_jsonl() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AuditLog::new(tmp.path(), true);
        log.record(AuditEvent::ToolExec {
            session_key: "s1".into(),
            tool_name: "shell".into(),
            call_id: "c1".into(),
        });
        log.record(AuditEvent::ToolDenied {
            session_key: "s1".into(),
            tool_name: "shell".into(),
            call_id: "c2".into(),
            reason: Some("nope".into()),
        });

        let contents = std::fs::read_to_string(tmp.path().join("audit.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("tool_exec"));
        assert!(lines[1].contains("tool_denied"));
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AuditLog::new(tmp.path(), false);
        log.record(AuditEvent::ToolExec {
            session_key: "s1".into(),
            tool_name: "shell".into(),
            call_id: "c1".into(),
        });
        assert!(!tmp.path().join("audit.jsonl").exists());
    }
}
