//! Tool system for the agents.
//!
//! Tools are the side-effecting capabilities agents reach the outside world
//! through: calendars, mail, spreadsheets, notes. Each one takes structured JSON
//! arguments and returns a structured JSON result or an error.
//!
//! The [`ToolRegistry`] is populated once at startup and is read-only
//! afterwards. Every agent gets its own narrowed registry holding only the
//! tools its catalog entry declares.

mod clock;
mod feedback;
mod remote;

pub use clock::CurrentDateTime;
pub use feedback::HumanFeedback;
pub use remote::RemoteTool;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::RemoteToolConfig;
use crate::config::ConfigError;
use crate::llm::{FunctionDefinition, ToolDefinition};

/// A failed tool invocation. Agents report these back to the model as
/// observations instead of aborting.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool {tool} failed: {message}")]
    Failed { tool: String, message: String },
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Narrow the registry to `names`.
    ///
    /// # Errors
    /// Returns the first name with no registered implementation.
    pub fn subset<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<Self, ToolError> {
        let mut tools = BTreeMap::new();
        for name in names {
            let tool = self
                .lookup(name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            tools.insert(name.to_string(), tool);
        }
        Ok(Self { tools })
    }

    /// Get tool schemas in the oracle's format.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.execute(args).await.map_err(|e| ToolError::Failed {
            tool: name.to_string(),
            message: format!("{:#}", e),
        })
    }
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn register(self, tool: impl Tool + 'static) -> Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' registered twice; keeping the later one", name);
        }
        self
    }

    /// Register the tools that need no external service.
    pub fn with_builtins(self, timezone_offset_hours: Option<i32>) -> Self {
        self.register(CurrentDateTime::new(timezone_offset_hours))
            .register(HumanFeedback::stdin())
    }

    /// Register HTTP-backed tools declared in the catalog.
    pub fn with_remote_tools(
        mut self,
        remote: &[(String, RemoteToolConfig)],
    ) -> Result<Self, ConfigError> {
        for (name, config) in remote {
            self = self.register(RemoteTool::from_config(name, config)?);
        }
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        tracing::info!("Tool registry complete with {} tools", self.tools.len());
        ToolRegistry { tools: self.tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingTool, RecordingTool};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register(RecordingTool::new("get_contacts", json!({"data": [["Ada", "ada@example.com"]]})))
            .register(FailingTool::new("send_email", "SMTP unavailable"))
            .build()
    }

    #[test]
    fn lookup_and_definitions_are_sorted() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.has_tool("get_contacts"));
        assert!(registry.lookup("check_emails").is_none());
        let names: Vec<_> = registry
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["get_contacts", "send_email"]);
    }

    #[test]
    fn subset_reports_missing_tool() {
        let err = registry().subset(["get_contacts", "add_calendar_event"]).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "add_calendar_event"));
    }

    #[test]
    fn subset_narrows_registry() {
        let narrowed = registry().subset(["get_contacts"]).unwrap();
        assert_eq!(narrowed.len(), 1);
        assert!(!narrowed.has_tool("send_email"));
        let defs = narrowed.definitions();
        assert_eq!(defs[0].function.name, "get_contacts");
        assert_eq!(defs[0].tool_type, "function");
    }

    #[tokio::test]
    async fn invoke_returns_result_or_tool_error() {
        let registry = registry();
        let value = registry.invoke("get_contacts", json!({})).await.unwrap();
        assert_eq!(value, json!({"data": [["Ada", "ada@example.com"]]}));

        let err = registry.invoke("send_email", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { ref tool, .. } if tool == "send_email"));
        assert!(err.to_string().contains("SMTP unavailable"));

        let err = registry.invoke("label_email", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ToolRegistry::builder().with_builtins(None).build();
        assert!(registry.has_tool("get_current_date_and_time"));
        assert!(registry.has_tool("human_feedback"));
    }
}
