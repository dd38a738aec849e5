//! Agent node - a specialist that works through one instruction with its tools.
//!
//! # Loop
//! 1. Build context: rendered system prompt plus the visible history
//! 2. Ask the oracle with the agent's tool definitions attached
//! 3. Run every requested tool call; failures become observations
//! 4. Repeat until the oracle answers in plain text or the iteration cap hits
//!
//! The node always hands control back to the supervisor with exactly one
//! message authored by the agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::types::{Command, RunError};
use super::Node;
use crate::catalog::{AgentCatalog, AgentId, AgentSpec, HistoryMode};
use crate::config::ConfigError;
use crate::conversation::{Message, RunState};
use crate::llm::{ChatMessage, ChatResponse, LlmClient, TokenUsage, ToolCall, ToolDefinition};
use crate::tools::{ToolError, ToolRegistry};
use crate::util::{preview, strip_think_blocks};

/// Reported when the oracle ends the loop with no text.
const NO_ANSWER: &str = "No answer: the agent finished without a final response.";

/// Outcome of one agent activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLoopResult {
    /// Final text reported back to the supervisor.
    pub summary: String,
    /// Oracle calls made.
    pub iterations: usize,
    /// One line per tool call: name and raw arguments.
    pub tool_log: Vec<String>,
    /// True when the loop stopped at the iteration cap.
    pub hit_limit: bool,
    /// Tokens spent across all oracle calls of this activation.
    pub usage: TokenUsage,
}

/// A catalog agent bound to its tools and the oracle.
pub struct AgentNode {
    spec: AgentSpec,
    prompt: String,
    tools: ToolRegistry,
    definitions: Vec<ToolDefinition>,
    llm: Arc<dyn LlmClient>,
    max_iterations: usize,
}

impl AgentNode {
    /// Bind `spec` to its declared tools.
    ///
    /// # Errors
    /// `UnknownTool` when a declared tool has no registered implementation.
    pub fn new(
        catalog: &AgentCatalog,
        spec: &AgentSpec,
        registry: &ToolRegistry,
        llm: Arc<dyn LlmClient>,
        max_iterations: usize,
    ) -> Result<Self, ConfigError> {
        let tools = registry.subset(spec.tool_ids()).map_err(|e| match e {
            ToolError::NotFound(tool) => ConfigError::UnknownTool {
                agent: spec.id.to_string(),
                tool,
            },
            other => ConfigError::InvalidCatalog(other.to_string()),
        })?;

        Ok(Self {
            prompt: catalog.render_prompt(spec),
            definitions: tools.definitions(),
            spec: spec.clone(),
            tools,
            llm,
            max_iterations,
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.spec.id
    }

    /// Initial oracle context for this activation.
    fn build_context(&self, state: &RunState) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.prompt)];
        match self.spec.history {
            HistoryMode::Full => messages.extend(state.messages().to_chat()),
            HistoryMode::LastInstruction => {
                // Small models get only the current task, phrased as a user turn.
                let task = state
                    .messages()
                    .last_instruction()
                    .or_else(|| state.messages().last())
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                messages.push(ChatMessage::user(task));
            }
        }
        messages
    }

    /// Run one tool call and render the observation fed back to the oracle.
    async fn execute_tool_call(&self, call: &ToolCall) -> String {
        let result = match parse_arguments(call) {
            Ok(args) => self.tools.invoke(&call.function.name, args).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => render_observation(value),
            Err(e) => {
                tracing::warn!(
                    agent = %self.spec.id,
                    tool = %call.function.name,
                    "Tool call failed: {}",
                    e
                );
                format!("Error: {}", e)
            }
        }
    }

    /// Tool-use loop. Only oracle transport failures are errors.
    pub async fn run_loop(&self, state: &RunState) -> Result<ExecutionLoopResult, RunError> {
        let node = self.spec.id.as_str();
        let mut messages = self.build_context(state);
        let mut tool_log = Vec::new();
        let mut usage = TokenUsage::default();
        let tools = (!self.definitions.is_empty()).then_some(self.definitions.as_slice());

        for iteration in 0..self.max_iterations {
            tracing::debug!(agent = node, "Agent iteration {}", iteration + 1);

            let response: ChatResponse = self
                .llm
                .chat_completion(&self.spec.model, &messages, tools)
                .await
                .map_err(|e| RunError::oracle(node, e))?;
            if let Some(call_usage) = &response.usage {
                usage.accumulate(call_usage);
            }
            if response.is_truncated() {
                tracing::warn!(agent = node, "Oracle response hit the output token limit");
            }

            let calls = response.requested_tools();
            if !calls.is_empty() {
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    calls.to_vec(),
                ));

                for call in calls {
                    tool_log.push(format!(
                        "Tool: {} Args: {}",
                        call.function.name, call.function.arguments
                    ));
                    let observation = self.execute_tool_call(call).await;
                    tracing::debug!(
                        agent = node,
                        tool = %call.function.name,
                        "Observation: {}",
                        preview(&observation, 200)
                    );
                    messages.push(ChatMessage::tool_result(&call.id, observation));
                }
                continue;
            }

            let raw = response.content.unwrap_or_default();
            let mut summary = strip_think_blocks(&raw);
            if summary.is_empty() {
                tracing::warn!(agent = node, "Oracle finished without a final answer");
                summary = NO_ANSWER.to_string();
            }
            return Ok(ExecutionLoopResult {
                summary,
                iterations: iteration + 1,
                tool_log,
                hit_limit: false,
                usage,
            });
        }

        tracing::warn!(
            agent = node,
            "Iteration limit ({}) reached without a final answer",
            self.max_iterations
        );
        Ok(ExecutionLoopResult {
            summary: format!(
                "Stopped after {} tool-use rounds without a final answer. Tool calls made:\n{}",
                self.max_iterations,
                tool_log.join("\n")
            ),
            iterations: self.max_iterations,
            tool_log,
            hit_limit: true,
            usage,
        })
    }
}

/// Arguments arrive as a JSON string; empty means no arguments.
fn parse_arguments(call: &ToolCall) -> Result<Value, ToolError> {
    let raw = call.function.arguments.trim();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: call.function.name.clone(),
        message: e.to_string(),
    })
}

fn render_observation(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[async_trait]
impl Node for AgentNode {
    fn name(&self) -> &str {
        self.spec.id.as_str()
    }

    async fn invoke(&self, state: &RunState) -> Result<Command, RunError> {
        let result = self.run_loop(state).await?;
        tracing::info!(
            agent = %self.spec.id,
            iterations = result.iterations,
            tool_calls = result.tool_log.len(),
            hit_limit = result.hit_limit,
            tokens = result.usage.total_tokens,
            "Agent reporting: {}",
            preview(&result.summary, 200)
        );
        Ok(Command::report(Message::agent(
            self.spec.id.clone(),
            result.summary,
        )))
    }
}
