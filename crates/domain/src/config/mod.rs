mod agents;
mod llm;
mod memory;
mod observability;
mod security;
mod server;
mod tools;

pub use agents::*;
pub use llm::*;
pub use memory::*;
pub use observability::*;
pub use security::*;
pub use server::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.gateway.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "gateway.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.gateway.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "gateway.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.agents.default.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents.default".into(),
                message: "default agent id must not be empty".into(),
            });
        }

        for id in &self.agents.provider_fallback_order {
            if id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "agents.provider_fallback_order".into(),
                    message: "fallback order must not contain an empty provider id".into(),
                });
                break;
            }
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }
            if provider.auth.env.as_ref().is_some_and(|v| v.is_empty()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].auth.env"),
                    message: "auth.env, if set, must not be an empty string".into(),
                });
            }
        }

        if self.tools.timeout == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.timeout".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        if self.tools.max_output_bytes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.max_output_bytes".into(),
                message: "max_output_bytes must be greater than 0".into(),
            });
        }

        if self.tools.browser.max_actions_per_call == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.browser.max_actions_per_call".into(),
                message: "max_actions_per_call must be at least 1".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "observability.sample_rate".into(),
                message: "sample_rate must be between 0.0 and 1.0".into(),
            });
        }

        if let Some(endpoint) = &self.observability.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "observability.otlp_endpoint".into(),
                    message: format!(
                        "otlp_endpoint must start with http:// or https:// (got \"{endpoint}\")"
                    ),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build a minimal valid Config.
    fn valid_config() -> Config {
        Config {
            gateway: GatewayConfig {
                port: 18789,
                host: "127.0.0.1".into(),
            },
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        env: Some("OPENAI_API_KEY".into()),
                    },
                    default_model: None,
                }],
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    /// Helper: find the first issue matching a field prefix.
    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn default_config_passes_with_only_warnings() {
        // The shipped defaults carry two providers with no credentials set
        // (keys come from the environment), so no errors are expected.
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn gateway_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "gateway.port").expect("expected gateway.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn gateway_host_empty_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.host = String::new();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "gateway.host").expect("expected gateway.host error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn agents_default_empty_is_error() {
        let mut cfg = valid_config();
        cfg.agents.default = String::new();
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "agents.default").expect("expected agents.default error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn provider_base_url_invalid_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].base_url = "ws://localhost:1234".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers[0].base_url")
            .expect("expected provider base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn provider_empty_env_string_is_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].auth = AuthConfig {
            env: Some(String::new()),
        };
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers[0].auth.env")
            .expect("expected auth.env error for empty string");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn provider_no_auth_env_is_ok() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].auth = AuthConfig { env: None };
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.providers[0].auth").is_none());
    }

    #[test]
    fn duplicate_provider_ids_is_warning() {
        let mut cfg = valid_config();
        let mut second = cfg.llm.providers[0].clone();
        second.auth.env = Some("OPENAI_API_KEY_2".into());
        cfg.llm.providers.push(second);
        let issues = cfg.validate();
        let dup_issues: Vec<_> = issues
            .iter()
            .filter(|e| e.message.contains("duplicate provider id"))
            .collect();
        assert_eq!(dup_issues.len(), 1);
        assert_eq!(dup_issues[0].severity, ConfigSeverity::Warning);
    }

    #[test]
    fn unique_provider_ids_no_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.push(ProviderConfig {
            id: "anthropic".into(),
            kind: ProviderKind::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            auth: AuthConfig {
                env: Some("ANTHROPIC_API_KEY".into()),
            },
            default_model: None,
        });
        let issues = cfg.validate();
        let dup_issues: Vec<_> = issues
            .iter()
            .filter(|e| e.message.contains("duplicate"))
            .collect();
        assert!(dup_issues.is_empty());
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "llm.providers").expect("expected no-providers warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn tools_timeout_zero_is_error() {
        let mut cfg = valid_config();
        cfg.tools.timeout = 0;
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "tools.timeout").expect("expected tools.timeout error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn tools_max_output_bytes_zero_is_error() {
        let mut cfg = valid_config();
        cfg.tools.max_output_bytes = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "tools.max_output_bytes")
            .expect("expected tools.max_output_bytes error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn browser_max_actions_zero_is_error() {
        let mut cfg = valid_config();
        cfg.tools.browser.max_actions_per_call = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "tools.browser.max_actions_per_call")
            .expect("expected max_actions_per_call error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn sample_rate_out_of_range_is_error() {
        let mut cfg = valid_config();
        cfg.observability.sample_rate = 1.5;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "observability.sample_rate")
            .expect("expected sample_rate error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn otlp_endpoint_invalid_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.observability.otlp_endpoint = Some("localhost:4317".into());
        let issues = cfg.validate();
        let issue = find_issue(&issues, "observability.otlp_endpoint")
            .expect("expected otlp_endpoint error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn otlp_endpoint_none_no_error() {
        let mut cfg = valid_config();
        cfg.observability.otlp_endpoint = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "observability.otlp_endpoint").is_none());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "gateway.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] gateway.port: port must be greater than 0"
        );

        let warn = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "llm.providers".into(),
            message: "no LLM providers configured".into(),
        };
        assert_eq!(
            format!("{warn}"),
            "[WARN] llm.providers: no LLM providers configured"
        );
    }
}
