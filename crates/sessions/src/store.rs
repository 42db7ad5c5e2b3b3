//! Gateway-owned session store.
//!
//! Each session is two files under the sessions directory: a metadata
//! record (`<id>.meta.json`) and an append-only transcript
//! (`<id>.jsonl`, see [`crate::transcript`]). The two files are not
//! written atomically together — a crash between them leaves the
//! transcript ahead of (or behind) its metadata, which is fine because
//! nothing ever reads them as a single unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gw_domain::error::{Error, Result};
use gw_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The sidecar metadata record for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: Uuid,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub label: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Gateway-owned session store backed by one metadata file per session
/// under `<state_path>/sessions/`.
pub struct SessionStore {
    dir: PathBuf,
    cache: RwLock<HashMap<Uuid, SessionMeta>>,
}

impl SessionStore {
    /// Load every `<uuid>.meta.json` under `state_path/sessions/` into an
    /// in-memory cache. Malformed metadata files are skipped (logged),
    /// mirroring `list`'s own tolerance for partial writes.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let mut cache = HashMap::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Some(id_str) = name.strip_suffix(".meta.json") else {
                    continue;
                };
                let Ok(id) = id_str.parse::<Uuid>() else {
                    continue;
                };
                match std::fs::read_to_string(&path) {
                    Ok(raw) => match serde_json::from_str::<SessionMeta>(&raw) {
                        Ok(meta) => {
                            cache.insert(id, meta);
                        }
                        Err(e) => {
                            tracing::warn!(session_id = %id, error = %e, "skipping malformed session metadata");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(session_id = %id, error = %e, "failed to read session metadata");
                    }
                }
            }
        }

        tracing::info!(sessions = cache.len(), path = %dir.display(), "session store loaded");

        Ok(Self {
            dir,
            cache: RwLock::new(cache),
        })
    }

    fn meta_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.meta.json"))
    }

    fn persist(&self, meta: &SessionMeta) -> Result<()> {
        let json = serde_json::to_string_pretty(meta)
            .map_err(|e| Error::Other(format!("serializing session metadata: {e}")))?;
        std::fs::write(self.meta_path(meta.id), json).map_err(Error::Io)
    }

    /// Create a new session bound to `agent_id` (falls back to the
    /// gateway's configured default elsewhere when `None`).
    pub fn create(&self, agent_id: impl Into<String>) -> Result<SessionMeta> {
        let now = Utc::now();
        let meta = SessionMeta {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            created_at: now,
            updated_at: now,
            label: None,
        };

        self.persist(&meta)?;
        self.cache.write().insert(meta.id, meta.clone());

        TraceEvent::SessionCreated {
            session_id: meta.id.to_string(),
            agent_id: meta.agent_id.clone(),
        }
        .emit();

        Ok(meta)
    }

    /// Look up a session by id. Returns `None` for an unknown key rather
    /// than an error.
    pub fn get(&self, id: Uuid) -> Option<SessionMeta> {
        self.cache.read().get(&id).cloned()
    }

    /// All known sessions, sorted newest-first by `created_at`.
    pub fn list(&self) -> Vec<SessionMeta> {
        let mut sessions: Vec<_> = self.cache.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Bump `updated_at` to now.
    pub fn touch(&self, id: Uuid) -> Result<()> {
        let mut cache = self.cache.write();
        let Some(meta) = cache.get_mut(&id) else {
            return Ok(());
        };
        meta.updated_at = Utc::now();
        let snapshot = meta.clone();
        drop(cache);
        self.persist(&snapshot)
    }

    /// Attach (or clear, with `None`) a human-readable label.
    pub fn set_label(&self, id: Uuid, label: Option<String>) -> Result<()> {
        let mut cache = self.cache.write();
        let Some(meta) = cache.get_mut(&id) else {
            return Ok(());
        };
        meta.label = label;
        meta.updated_at = Utc::now();
        let snapshot = meta.clone();
        drop(cache);
        self.persist(&snapshot)
    }

    /// Directory transcripts live in — shared with the transcript writer.
    pub fn transcript_dir(&self) -> PathBuf {
        self.dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path()).unwrap();
        let meta = store.create("assistant").unwrap();
        let fetched = store.get(meta.id).expect("session should exist");
        assert_eq!(fetched.agent_id, "assistant");
        assert!(fetched.label.is_none());
    }

    #[test]
    fn get_unknown_id_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path()).unwrap();
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn list_sorts_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path()).unwrap();
        let first = store.create("assistant").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store.create("assistant").unwrap();
        let listed = store.list();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn set_label_persists_across_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path()).unwrap();
        let meta = store.create("assistant").unwrap();
        store.set_label(meta.id, Some("my chat".into())).unwrap();

        let reloaded = SessionStore::new(tmp.path()).unwrap();
        let fetched = reloaded.get(meta.id).unwrap();
        assert_eq!(fetched.label.as_deref(), Some("my chat"));
    }

    #[test]
    fn malformed_metadata_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sessions")).unwrap();
        let bad_id = Uuid::new_v4();
        std::fs::write(
            tmp.path()
                .join("sessions")
                .join(format!("{bad_id}.meta.json")),
            "{ not json",
        )
        .unwrap();

        let store = SessionStore::new(tmp.path()).unwrap();
        assert!(store.get(bad_id).is_none());
        assert!(store.list().is_empty());
    }

    #[test]
    fn touch_updates_updated_at() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path()).unwrap();
        let meta = store.create("assistant").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.touch(meta.id).unwrap();
        let fetched = store.get(meta.id).unwrap();
        assert!(fetched.updated_at > meta.created_at);
    }
}
