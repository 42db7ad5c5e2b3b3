//! Append-only JSONL transcripts.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions directory.
//! Every transcript event is appended as a single JSON line.

use std::path::{Path, PathBuf};

use chrono::Utc;
use gw_domain::error::{Error, Result};
use gw_domain::trace::TraceEvent;
use serde::{Deserialize, Serialize};

/// A single transcript record.
///
/// `role` is one of `user`, `assistant`, `tool_result`. `run_id`
/// correlates tool-result and assistant records with the streaming turn
/// that produced them; `tool_name` is set only when `role == tool_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub timestamp: String,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_count: Option<usize>,
}

/// Writes and reads append-only JSONL transcript files.
pub struct TranscriptWriter {
    base_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Append one or more lines to a session's transcript. A torn write
    /// (process killed mid-`write_all`) leaves a partial trailing line
    /// that `read` discards on the next load.
    pub fn append(&self, session_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let path = self.base_dir.join(format!("{session_id}.jsonl"));
        let mut buf = String::new();
        for line in lines {
            let json = serde_json::to_string(line)
                .map_err(|e| Error::Other(format!("serializing transcript line: {e}")))?;
            buf.push_str(&json);
            buf.push('\n');
        }

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).map_err(Error::Io)?;

        TraceEvent::TranscriptAppend {
            session_id: session_id.to_owned(),
            lines: lines.len(),
        }
        .emit();

        Ok(())
    }

    /// Helper to build a transcript line stamped with the current time.
    pub fn line(role: &str, content: &str) -> TranscriptLine {
        TranscriptLine {
            timestamp: Utc::now().to_rfc3339(),
            role: role.to_owned(),
            content: content.to_owned(),
            run_id: None,
            tool_name: None,
            attachment_count: None,
        }
    }

    /// Read back a transcript. Malformed trailing lines are skipped and
    /// logged rather than failing the whole read.
    pub fn read(&self, session_id: &str) -> Result<Vec<TranscriptLine>> {
        let path = self.base_dir.join(format!("{session_id}.jsonl"));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut lines = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptLine>(line) {
                Ok(tl) => lines.push(tl),
                Err(e) => {
                    tracing::warn!(
                        session_id = session_id,
                        error = %e,
                        "skipping malformed transcript line"
                    );
                }
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(tmp.path());
        let line = TranscriptWriter::line("user", "hello");
        writer.append("s1", std::slice::from_ref(&line)).unwrap();

        let lines = writer.read("s1").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, "hello");
    }

    #[test]
    fn read_unknown_session_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(tmp.path());
        assert!(writer.read("nope").unwrap().is_empty());
    }

    #[test]
    fn malformed_trailing_line_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(tmp.path());
        let good = TranscriptWriter::line("user", "hello");
        writer.append("s1", std::slice::from_ref(&good)).unwrap();

        // Simulate a torn write: append a truncated JSON fragment.
        use std::io::Write;
        let path = tmp.path().join("s1.jsonl");
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"timestamp\":\"2024").unwrap();

        let lines = writer.read("s1").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, "hello");
    }

    #[test]
    fn append_is_append_only() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(tmp.path());
        writer
            .append("s1", std::slice::from_ref(&TranscriptWriter::line("user", "one")))
            .unwrap();
        writer
            .append(
                "s1",
                std::slice::from_ref(&TranscriptWriter::line("assistant", "two")),
            )
            .unwrap();

        let lines = writer.read("s1").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].content, "one");
        assert_eq!(lines[1].content, "two");
    }
}
