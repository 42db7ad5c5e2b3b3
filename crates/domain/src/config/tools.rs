use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Shell tool wall-clock cap (ms) before the polite-then-force kill escalation.
    #[serde(default = "d_timeout_ms")]
    pub timeout: u64,
    /// Shell tool merged stdout+stderr cap, in bytes.
    #[serde(default = "d_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Headless browser tool configuration.
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: d_timeout_ms(),
            max_output_bytes: d_max_output_bytes(),
            browser: BrowserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "d_nav_commit_ms")]
    pub navigation_commit_timeout_ms: u64,
    #[serde(default = "d_nav_dcl_ms")]
    pub navigation_dcl_timeout_ms: u64,
    #[serde(default = "d_extract_chars")]
    pub extract_max_chars: usize,
    #[serde(default = "d_max_actions")]
    pub max_actions_per_call: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            navigation_commit_timeout_ms: d_nav_commit_ms(),
            navigation_dcl_timeout_ms: d_nav_dcl_ms(),
            extract_max_chars: d_extract_chars(),
            max_actions_per_call: d_max_actions(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    120_000
}
fn d_max_output_bytes() -> usize {
    100 * 1024
}
fn d_nav_commit_ms() -> u64 {
    20_000
}
fn d_nav_dcl_ms() -> u64 {
    3_000
}
fn d_extract_chars() -> usize {
    10_000
}
fn d_max_actions() -> usize {
    20
}
