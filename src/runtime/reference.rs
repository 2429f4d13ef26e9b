//! `LlmReference`: a bundle of prompt contribution plus a set of tools
//! sharing a name prefix, so the LLM can associate a tool call back to the
//! reference that offered it.

use crate::runtime::tool::Tool;

/// A named, described contributor to a `PromptRunner` invocation that
/// supplies both a prompt fragment and zero or more tools.
pub struct LlmReference {
    pub name: String,
    pub description: String,
    pub notes: Option<String>,
    pub tool_prefix: Option<String>,
    tools: Vec<Tool>,
}

impl LlmReference {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            notes: None,
            tool_prefix: None,
            tools: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = Some(prefix.into());
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Tools contributed by this reference, as the loop driver will receive
    /// them (prefixing is applied at registration time by the `PromptRunner`,
    /// not here, so a reference's tools stay reusable across prefixes).
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// The prompt fragment this reference contributes.
    pub fn contribution(&self) -> String {
        let mut text = format!("# {}\n{}", self.name, self.description);
        if let Some(notes) = &self.notes {
            text.push_str("\n\n");
            text.push_str(notes);
        }
        text
    }
}
