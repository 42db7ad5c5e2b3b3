use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agents / workspace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agent id used when a session is created without one.
    #[serde(default = "d_default_agent")]
    pub default: String,
    /// Override the workspace directory (AGENTS.md, SOUL.md, TOOLS.md, SCHEDULER.md).
    #[serde(default)]
    pub workspace_path: Option<PathBuf>,
    /// Provider fallback order consulted when an agent's configured model
    /// names a provider that isn't currently available.
    #[serde(default = "d_fallback_order")]
    pub provider_fallback_order: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default: d_default_agent(),
            workspace_path: None,
            provider_fallback_order: d_fallback_order(),
        }
    }
}

fn d_default_agent() -> String {
    "assistant".into()
}

fn d_fallback_order() -> Vec<String> {
    vec!["openai".into(), "anthropic".into()]
}
