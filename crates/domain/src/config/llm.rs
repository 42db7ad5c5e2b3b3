use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Registered providers. Each entry names a provider id, its kind
    /// (which on-wire protocol to speak) and base URL; the credential
    /// itself is resolved from `auth.env` at startup, never read from
    /// this file.
    #[serde(default = "d_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            providers: d_providers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
}

/// Names the environment variable that carries the provider's API key.
/// The key itself is resolved at startup and never stored in, or
/// round-tripped through, the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub env: Option<String>,
}

fn d_timeout_ms() -> u64 {
    20_000
}
fn d_max_retries() -> u32 {
    2
}

fn d_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "anthropic".into(),
            kind: ProviderKind::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            auth: AuthConfig {
                env: Some("ANTHROPIC_API_KEY".into()),
            },
            default_model: Some("claude-sonnet-4-20250514".into()),
        },
        ProviderConfig {
            id: "openai".into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            auth: AuthConfig {
                env: Some("OPENAI_API_KEY".into()),
            },
            default_model: Some("gpt-4o".into()),
        },
    ]
}
