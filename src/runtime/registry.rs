//! Process-wide tool and tool-group registries.
//!
//! There is exactly one way to reach a tool here, by name, in a flat
//! `HashMap`. Registries are built once at startup and are read-only
//! afterward; runtime mutation (e.g. façade expansion) happens on a
//! per-invocation `Vec<Tool>` snapshot, never on the shared registry.

use std::collections::HashMap;

use crate::runtime::error::RuntimeError;
use crate::runtime::tool::Tool;

/// A process-wide collection of tools, keyed by name.
///
/// The last-registered tool for a given name wins, and a warning is logged.
/// A fail-fast mode was considered but not implemented; no configuration
/// surface was specified for it and adding one unused would be speculative.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, validating its name against the tool-name character
    /// set (`[a-zA-Z0-9_]+`) before insertion.
    pub fn register(&mut self, tool: Tool) -> Result<(), RuntimeError> {
        tool.definition().validate_name()?;
        if self.tools.contains_key(tool.name()) {
            log::warn!(
                "tool '{}' registered twice; the newer registration replaces the older one",
                tool.name()
            );
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Tool> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn list(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A named set of tools sharing a role, resolved from the process-wide
/// registry at `PromptRunner` construction time.
#[derive(Default)]
pub struct ToolGroupRegistry {
    groups: HashMap<String, Vec<String>>,
}

impl ToolGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, group_name: impl Into<String>, tool_names: Vec<String>) {
        self.groups.insert(group_name.into(), tool_names);
    }

    /// Resolve a group's tool names into concrete tools from the given
    /// registry, skipping (and logging) any that are no longer registered.
    pub fn resolve(&self, group_name: &str, tools: &ToolRegistry) -> Vec<Tool> {
        self.groups
            .get(group_name)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| {
                        let tool = tools.get(name);
                        if tool.is_none() {
                            log::warn!("tool group '{}' references unknown tool '{}'", group_name, name);
                        }
                        tool.cloned()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::schema::InputSchema;
    use crate::runtime::tool::{FnToolHandler, ToolCallResult, ToolDefinition};
    use std::sync::Arc;

    fn dummy_tool(name: &str) -> Tool {
        Tool::new(
            ToolDefinition::new(name, "a dummy tool", InputSchema::new()),
            Arc::new(FnToolHandler(|_| Ok(ToolCallResult::Text("ok".to_string())))),
        )
    }

    #[test]
    fn register_rejects_invalid_names() {
        let mut registry = ToolRegistry::new();
        let bad = dummy_tool("not a valid name!");
        assert!(registry.register(bad).is_err());
    }

    #[test]
    fn later_registration_wins_on_collision() {
        let mut registry = ToolRegistry::new();
        registry.register(dummy_tool("search")).unwrap();
        registry.register(dummy_tool("search")).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn group_resolution_skips_missing_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(dummy_tool("a")).unwrap();

        let mut groups = ToolGroupRegistry::new();
        groups.define("search-group", vec!["a".to_string(), "missing".to_string()]);

        let resolved = groups.resolve("search-group", &registry);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "a");
    }
}
