use serde::Serialize;
use serde_json::Value;

use crate::error::FailureKind;
use crate::tool::{Outcome, Tool};

/// A named bundle of tools plus the descriptive metadata the planner uses
/// to decide when to engage it. A provider owns its tools exclusively;
/// tool order is significant (the first tool is the provider's entry
/// operation, run when the provider appears as a workflow stage), but all
/// lookup is by name.
pub struct Provider {
    name: String,
    description: String,
    instruction: String,
    tools: Vec<Tool>,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instruction: instruction.into(),
            tools: Vec::new(),
        }
    }

    /// Register a tool. Names must be unique within the provider.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        debug_assert!(
            self.tool(tool.name()).is_none(),
            "duplicate tool `{}` in provider `{}`",
            tool.name(),
            self.name
        );
        self.tools.push(tool);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Behavioral instruction for the planner. Free text, not interpreted
    /// by the core.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Look up a tool by its stable name.
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// The provider's primary operation, i.e. the first registered tool.
    pub fn entry(&self) -> Option<&Tool> {
        self.tools.first()
    }

    /// Invoke a tool by name. An unknown name is a structured `NotFound`
    /// failure, not a fault.
    pub async fn invoke(&self, tool: &str, args: &Value) -> Outcome {
        match self.tool(tool) {
            Some(tool) => tool.invoke(args).await,
            None => Outcome::failure(
                FailureKind::NotFound,
                format!("provider `{}` has no tool `{tool}`", self.name),
            ),
        }
    }

    /// The planner-facing manifest: identity, metadata, and tool schemas.
    pub fn manifest(&self) -> ProviderManifest {
        ProviderManifest {
            name: self.name.clone(),
            description: self.description.clone(),
            instruction: self.instruction.clone(),
            tools: self.tools.iter().map(Tool::manifest).collect(),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("tools", &self.tools.iter().map(Tool::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Serialized provider contract handed to the external planner.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderManifest {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<Value>,
}
