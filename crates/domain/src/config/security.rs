use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Security
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Append-only `audit.jsonl` event log. Writes are best-effort regardless.
    #[serde(default = "d_true")]
    pub audit_log: bool,
    /// Secret-redaction filter applied to tool output before it reaches the
    /// audit log or the model's next turn.
    #[serde(default = "d_true")]
    pub secrets_filter: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            audit_log: true,
            secrets_filter: true,
        }
    }
}

fn d_true() -> bool {
    true
}
