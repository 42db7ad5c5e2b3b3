//! Registry of in-flight runs and their cancellation handles (§4.4/§4.6).
//!
//! Adapted from a cooperative cancellation-token pattern: cancelling a
//! run flips an atomic flag the turn loop checks between tool calls and
//! before forwarding each chat event. There's no child-agent group
//! cascade here — the spec has no concept of sub-agents spawning
//! further runs, so a run only ever cancels itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ActiveRuns {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run_id: impl Into<String>) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().unwrap().insert(run_id.into(), token.clone());
        token
    }

    pub fn cancel(&self, run_id: &str) -> bool {
        match self.tokens.lock().unwrap().get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, run_id: &str) -> bool {
        self.tokens.lock().unwrap().contains_key(run_id)
    }

    pub fn remove(&self, run_id: &str) {
        self.tokens.lock().unwrap().remove(run_id);
    }

    pub fn list_running(&self) -> Vec<String> {
        self.tokens.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_cancel_flips_flag() {
        let runs = ActiveRuns::new();
        let token = runs.register("run1");
        assert!(!token.is_cancelled());
        assert!(runs.cancel("run1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_unknown_run_returns_false() {
        let runs = ActiveRuns::new();
        assert!(!runs.cancel("ghost"));
    }

    #[test]
    fn remove_clears_running_state() {
        let runs = ActiveRuns::new();
        runs.register("run1");
        assert!(runs.is_running("run1"));
        runs.remove("run1");
        assert!(!runs.is_running("run1"));
    }

    #[test]
    fn list_running_reflects_registrations() {
        let runs = ActiveRuns::new();
        runs.register("a");
        runs.register("b");
        let mut listed = runs.list_running();
        listed.sort();
        assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);
    }
}
