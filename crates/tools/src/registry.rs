//! Tool registry.
//!
//! Tools are looked up by name and listed in the order they were first
//! registered; registering the same name twice overwrites the earlier
//! entry in place rather than appending a duplicate.

use std::collections::HashMap;
use std::sync::Arc;

use gw_domain::tool::ToolDefinition;

use crate::tool::Tool;

#[derive(Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool definitions in registration order, for handing to a provider.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// Same as [`Self::definitions`], but when `ctx` auto-approves (an
    /// unattended scheduled run), every approval-requiring tool's
    /// description is amended to say so — the model otherwise tends to
    /// hedge and ask the user to confirm before calling a tool that will
    /// in fact run immediately and unattended.
    pub fn definitions_for_context(&self, ctx: &dyn crate::tool::ToolContext) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| {
                let mut def = t.definition();
                if ctx.auto_approve() && t.requires_approval() {
                    def.description.push_str(
                        " This call is already pre-approved for this run — invoke it directly, \
                         do not ask the user to confirm first.",
                    );
                }
                def
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gw_domain::error::Result;
    use gw_domain::tool::ToolResult;
    use serde_json::Value;

    struct Dummy(&'static str);

    #[async_trait]
    impl Tool for Dummy {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.into(),
                description: "dummy".into(),
                parameters: serde_json::json!({}),
            }
        }
        fn requires_approval(&self) -> bool {
            false
        }
        async fn execute(
            &self,
            _input: Value,
            _ctx: &dyn crate::tool::ToolContext,
        ) -> Result<ToolResult> {
            unimplemented!()
        }
    }

    #[test]
    fn registration_preserves_first_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Dummy("b")));
        registry.register(Arc::new(Dummy("a")));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn re_registering_a_name_overwrites_without_duplicating_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Dummy("shell")));
        registry.register(Arc::new(Dummy("shell")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions().len(), 1);
    }

    #[test]
    fn unknown_name_returns_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("nope").is_none());
    }

    struct Gated;

    #[async_trait]
    impl Tool for Gated {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "gated".into(),
                description: "does a risky thing".into(),
                parameters: serde_json::json!({}),
            }
        }
        fn requires_approval(&self) -> bool {
            true
        }
        async fn execute(
            &self,
            _input: Value,
            _ctx: &dyn crate::tool::ToolContext,
        ) -> Result<ToolResult> {
            unimplemented!()
        }
    }

    struct FakeCtx(bool);

    #[async_trait]
    impl crate::tool::ToolContext for FakeCtx {
        async fn request_approval(
            &self,
            _tool_name: &str,
            _summary: String,
            _details: Value,
        ) -> crate::tool::ApprovalDecision {
            crate::tool::ApprovalDecision::Approved
        }
        fn report_progress(&self, _message: String) {}
        fn auto_approve(&self) -> bool {
            self.0
        }
        fn redact(&self, text: &str) -> String {
            text.to_string()
        }
        fn record_exec(&self, _tool_name: &str) {}
    }

    #[test]
    fn definitions_for_context_amends_gated_tools_when_auto_approving() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Gated));
        registry.register(Arc::new(Dummy("plain")));

        let interactive = registry.definitions_for_context(&FakeCtx(false));
        assert_eq!(interactive[0].description, "does a risky thing");

        let scheduled = registry.definitions_for_context(&FakeCtx(true));
        assert!(scheduled[0].description.contains("pre-approved"));
        assert_eq!(scheduled[1].description, "dummy");
    }
}
