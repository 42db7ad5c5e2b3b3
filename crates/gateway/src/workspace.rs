//! Workspace files — the user-editable markdown consulted at every turn.
//!
//! `AGENTS.md` binds agent ids to a `provider/model` reference; `SOUL.md`
//! and `TOOLS.md` are appended verbatim to the system prompt; `SCHEDULER.md`
//! is an optional overlay used only when building the scheduler's system
//! prompt (§4.10 step 6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One agent binding parsed out of `AGENTS.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBinding {
    pub id: String,
    pub provider: String,
    pub model: Option<String>,
    pub description: String,
}

pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path.join(name)).unwrap_or_default()
    }

    pub fn soul(&self) -> String {
        self.read("SOUL.md")
    }

    pub fn tools_doc(&self) -> String {
        self.read("TOOLS.md")
    }

    pub fn scheduler_overlay(&self) -> Option<String> {
        let raw = self.read("SCHEDULER.md");
        if raw.trim().is_empty() {
            None
        } else {
            Some(raw)
        }
    }

    /// Base system prompt: `SOUL.md` followed by `TOOLS.md`, each
    /// appended only if non-empty.
    pub fn base_system_prompt(&self) -> String {
        let mut parts = Vec::new();
        let soul = self.soul();
        if !soul.trim().is_empty() {
            parts.push(soul);
        }
        let tools = self.tools_doc();
        if !tools.trim().is_empty() {
            parts.push(tools);
        }
        parts.join("\n\n")
    }

    /// Parse `AGENTS.md` into a map of agent id → binding.
    ///
    /// Each second-level heading (`## <id>`) starts a new agent; the
    /// first `Model: <provider>/<model>` line under it binds the
    /// provider/model reference. Surrounding prose — anything that
    /// isn't a `##` heading or a `Model:` line — is ignored, and also
    /// collected as the agent's description (first non-empty prose
    /// line under the heading).
    pub fn agents(&self) -> HashMap<String, AgentBinding> {
        let raw = self.read("AGENTS.md");
        parse_agents_md(&raw)
    }
}

fn parse_agents_md(raw: &str) -> HashMap<String, AgentBinding> {
    let mut agents = HashMap::new();
    let mut current: Option<(String, Option<String>, Option<String>, String)> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            if let Some((id, provider, model, description)) = current.take() {
                if let Some(provider) = provider {
                    agents.insert(
                        id.clone(),
                        AgentBinding {
                            id,
                            provider,
                            model,
                            description,
                        },
                    );
                }
            }
            current = Some((heading.trim().to_string(), None, None, String::new()));
            continue;
        }

        let Some((_, provider, model, description)) = current.as_mut() else {
            continue;
        };

        if let Some(spec) = trimmed
            .strip_prefix("Model:")
            .or_else(|| trimmed.strip_prefix("**Model:**"))
        {
            let spec = spec.trim();
            if provider.is_none() {
                match spec.split_once('/') {
                    Some((p, m)) => {
                        *provider = Some(p.trim().to_string());
                        *model = Some(m.trim().to_string());
                    }
                    None => *provider = Some(spec.to_string()),
                }
            }
        } else if !trimmed.is_empty() && description.is_empty() {
            *description = trimmed.to_string();
        }
    }

    if let Some((id, provider, model, description)) = current.take() {
        if let Some(provider) = provider {
            agents.insert(
                id.clone(),
                AgentBinding {
                    id,
                    provider,
                    model,
                    description,
                },
            );
        }
    }

    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_agent_with_model() {
        let md = "# Agents\n\n## assistant\nThe default helper.\nModel: anthropic/claude-sonnet-4\n";
        let agents = parse_agents_md(md);
        let a = agents.get("assistant").expect("assistant parsed");
        assert_eq!(a.provider, "anthropic");
        assert_eq!(a.model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(a.description, "The default helper.");
    }

    #[test]
    fn tolerates_surrounding_prose() {
        let md = r#"
# My Agents

Some intro text that should be ignored entirely.

## researcher

A careful researcher persona.

Model: openai/gpt-4o

Some trailing notes that don't matter.

## coder
Model: anthropic/claude-opus-4
"#;
        let agents = parse_agents_md(md);
        assert_eq!(agents.len(), 2);
        assert_eq!(agents["researcher"].provider, "openai");
        assert_eq!(agents["coder"].model.as_deref(), Some("claude-opus-4"));
    }

    #[test]
    fn agent_without_model_line_is_dropped() {
        let md = "## orphan\nNo model line here.\n";
        let agents = parse_agents_md(md);
        assert!(agents.is_empty());
    }

    #[test]
    fn model_without_slash_is_provider_only() {
        let md = "## bare\nModel: anthropic\n";
        let agents = parse_agents_md(md);
        assert_eq!(agents["bare"].provider, "anthropic");
        assert!(agents["bare"].model.is_none());
    }

    #[test]
    fn empty_file_yields_no_agents() {
        assert!(parse_agents_md("").is_empty());
    }

    #[test]
    fn base_system_prompt_skips_empty_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("SOUL.md"), "Be helpful.").unwrap();
        let ws = Workspace::new(tmp.path().to_path_buf());
        assert_eq!(ws.base_system_prompt(), "Be helpful.");
    }

    #[test]
    fn scheduler_overlay_none_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = Workspace::new(tmp.path().to_path_buf());
        assert!(ws.scheduler_overlay().is_none());
    }
}
