//! Provider registry.
//!
//! Builds and holds all configured LLM provider instances. A provider
//! that fails to initialize (most commonly: its `auth.env` variable
//! isn't set) is logged and skipped rather than aborting startup — the
//! gateway boots regardless, and the agent-resolution fallback order in
//! [`gw_domain::config::AgentsConfig`] is what decides whether a missing
//! provider actually blocks a chat turn.

use std::collections::HashMap;
use std::sync::Arc;

use gw_domain::config::{LlmConfig, ProviderKind};
use gw_domain::error::Result;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::Provider;

/// Mask substrings in an error message that look like API keys or bearer
/// tokens, so a misconfigured credential never reaches the logs.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn Provider>> = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn Provider>)
                }
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn Provider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %mask_secrets(&e.to_string()),
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        Ok(Self { providers })
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::config::{AuthConfig, ProviderConfig};

    #[test]
    fn unresolvable_provider_is_skipped_not_fatal() {
        let config = LlmConfig {
            default_timeout_ms: 20_000,
            max_retries: 2,
            providers: vec![ProviderConfig {
                id: "broken".into(),
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                auth: AuthConfig {
                    env: Some("GW_PROVIDERS_REGISTRY_TEST_UNSET".into()),
                },
                default_model: None,
            }],
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get("broken").is_none());
    }

    #[test]
    fn empty_config_yields_empty_registry() {
        let config = LlmConfig {
            default_timeout_ms: 20_000,
            max_retries: 2,
            providers: vec![],
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.list_providers(), Vec::<String>::new());
    }

    #[test]
    fn mask_secrets_redacts_long_tokens() {
        let msg = mask_secrets("unauthorized: sk-abcdefghijklmnopqrstuvwxyz0123456789");
        assert!(!msg.contains("abcdefghijklmnopqrstuvwxyz"));
    }
}
