//! Approval coordinator (§4.5).
//!
//! A tool awaiting approval blocks on a oneshot channel; the coordinator
//! hands out the sending half to whichever RPC call resolves the
//! approval. Exactly one of `resolve`/`reject` can ever succeed for a
//! given id — the oneshot enforces that structurally.
//!
//! Unlike the pattern this is adapted from, there is no timeout here:
//! the spec requires approvals to wait indefinitely for a human
//! decision, so a pending entry lives until it's resolved, rejected, or
//! the run that owns it is cancelled.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use gw_domain::error::{Error, Result};
use gw_tools::ApprovalDecision;

struct Pending {
    tool_name: String,
    summary: String,
    session_key: String,
    run_id: String,
    created_at: DateTime<Utc>,
    respond: oneshot::Sender<ApprovalDecision>,
}

/// Serializable snapshot of a pending approval, for `approval.list`.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalInfo {
    pub approval_id: Uuid,
    pub tool_name: String,
    pub summary: String,
    pub session_key: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ApprovalCoordinator {
    pending: Mutex<HashMap<Uuid, Pending>>,
}

impl ApprovalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending approval, returning the receiving half the
    /// caller awaits on.
    pub fn register(
        &self,
        approval_id: Uuid,
        tool_name: String,
        summary: String,
        session_key: String,
        run_id: String,
    ) -> oneshot::Receiver<ApprovalDecision> {
        let (tx, rx) = oneshot::channel();
        let entry = Pending {
            tool_name,
            summary,
            session_key,
            run_id,
            created_at: Utc::now(),
            respond: tx,
        };
        self.pending.lock().unwrap().insert(approval_id, entry);
        rx
    }

    pub fn resolve(&self, approval_id: Uuid) -> Result<()> {
        self.respond(approval_id, ApprovalDecision::Approved)
    }

    pub fn reject(&self, approval_id: Uuid, reason: Option<String>) -> Result<()> {
        self.respond(approval_id, ApprovalDecision::Denied { reason })
    }

    fn respond(&self, approval_id: Uuid, decision: ApprovalDecision) -> Result<()> {
        // §7 buckets an unknown approval id as Invalid-params (-32602),
        // distinct from the Internal (-32603) code a missing session or
        // job id gets — both are modeled as `NotFound` elsewhere, but this
        // one specific case is called out by name in the error taxonomy.
        let entry = self
            .pending
            .lock()
            .unwrap()
            .remove(&approval_id)
            .ok_or_else(|| Error::InvalidParams(format!("no pending approval '{approval_id}'")))?;
        // The receiver may already be gone if the run was cancelled; that's
        // not an error for the resolver, the decision is just discarded.
        let _ = entry.respond.send(decision);
        Ok(())
    }

    /// Drop a pending approval without resolving it — used when the run
    /// that owns it is cancelled. The waiting tool observes the oneshot
    /// being dropped and treats it as a denial.
    pub fn remove(&self, approval_id: Uuid) {
        self.pending.lock().unwrap().remove(&approval_id);
    }

    pub fn list_pending(&self) -> Vec<ApprovalInfo> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|(id, p)| ApprovalInfo {
                approval_id: *id,
                tool_name: p.tool_name.clone(),
                summary: p.summary.clone(),
                session_key: p.session_key.clone(),
                run_id: p.run_id.clone(),
                created_at: p.created_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_unblocks_waiter() {
        let coordinator = ApprovalCoordinator::new();
        let id = Uuid::new_v4();
        let rx = coordinator.register(
            id,
            "shell".into(),
            "run ls".into(),
            "sess".into(),
            "run1".into(),
        );
        coordinator.resolve(id).unwrap();
        assert!(matches!(rx.await.unwrap(), ApprovalDecision::Approved));
    }

    #[tokio::test]
    async fn reject_carries_reason() {
        let coordinator = ApprovalCoordinator::new();
        let id = Uuid::new_v4();
        let rx = coordinator.register(
            id,
            "shell".into(),
            "rm -rf".into(),
            "sess".into(),
            "run1".into(),
        );
        coordinator
            .reject(id, Some("too dangerous".into()))
            .unwrap();
        match rx.await.unwrap() {
            ApprovalDecision::Denied { reason } => assert_eq!(reason.as_deref(), Some("too dangerous")),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn resolving_unknown_id_errors() {
        let coordinator = ApprovalCoordinator::new();
        assert!(coordinator.resolve(Uuid::new_v4()).is_err());
    }

    #[test]
    fn resolving_twice_errors_second_time() {
        let coordinator = ApprovalCoordinator::new();
        let id = Uuid::new_v4();
        coordinator.register(id, "shell".into(), "x".into(), "s".into(), "r".into());
        assert!(coordinator.resolve(id).is_ok());
        assert!(coordinator.resolve(id).is_err());
    }

    #[test]
    fn list_pending_reflects_registrations() {
        let coordinator = ApprovalCoordinator::new();
        let id = Uuid::new_v4();
        coordinator.register(
            id,
            "browser".into(),
            "navigate".into(),
            "s".into(),
            "r".into(),
        );
        let listed = coordinator.list_pending();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].approval_id, id);
    }

    #[tokio::test]
    async fn remove_drops_receiver_without_panic() {
        let coordinator = ApprovalCoordinator::new();
        let id = Uuid::new_v4();
        let rx = coordinator.register(id, "shell".into(), "x".into(), "s".into(), "r".into());
        coordinator.remove(id);
        assert!(rx.await.is_err());
    }
}
