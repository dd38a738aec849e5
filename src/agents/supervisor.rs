//! Supervisor node - picks the next agent or declares the goal met.
//!
//! # Decision Procedure
//! 1. System prompt (roster + delegation policy) followed by the full history
//! 2. Schema-constrained oracle call for a `RoutingDecision`
//! 3. `FINISH`: go to the terminal state, append nothing
//! 4. Otherwise: go to the named agent with one instruction message
//!
//! Anything the oracle returns that does not parse into a decision naming a
//! member agent or `FINISH` is a contract violation. There is no fallback
//! route and no retry here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{Command, Route, RoutingDecision, RunError, FINISH};
use super::Node;
use crate::catalog::{render_template, AgentCatalog, AgentId};
use crate::conversation::RunState;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, ResponseFormat};
use crate::util::{json_object_candidates, preview, strip_think_blocks};

const NODE_NAME: &str = "supervisor";

/// Default system prompt. Placeholders: `{num_agents}`, `{agent_names}`, `{agents}`.
pub const DEFAULT_SUPERVISOR_PROMPT: &str = r#"# Role
You are the supervisor of a team of {num_agents} agents: {agent_names}.
Each agent has its own tools:

{agents}

# Instructions
1. Understand the user's goal and break it into ordered sub-tasks, each one small enough for a single agent.
2. Pick the agent best suited to the next sub-task.
3. Write that agent a self-contained instruction in "instruction". Include every detail it needs. Describe only the deliverable expected from it; never mention other agents or later steps.
4. After each agent reply, read its summary carefully and decide whether the goal is met.
5. When all work is done, set "next" to FINISH and summarize the outcome in "completion_summary".

# Output
Reply with a JSON object with exactly these fields:
- "next": one of {agent_names} or FINISH
- "instruction": the instruction for the chosen agent (empty when finishing)
- "completion_summary": what has been achieved so far"#;

/// Decision fields as the oracle emits them.
#[derive(Debug, Deserialize)]
struct RawDecision {
    next: String,
    #[serde(alias = "task_description_for_agent")]
    instruction: String,
    #[serde(alias = "message_completion_summary")]
    completion_summary: String,
}

/// The coordinator node.
pub struct SupervisorNode {
    llm: Arc<dyn LlmClient>,
    model: String,
    system_prompt: String,
    members: Vec<AgentId>,
}

impl SupervisorNode {
    pub fn new(catalog: &AgentCatalog, llm: Arc<dyn LlmClient>) -> Self {
        let members = catalog.member_ids().to_vec();
        let template = catalog
            .supervisor()
            .prompt
            .as_deref()
            .unwrap_or(DEFAULT_SUPERVISOR_PROMPT);
        let values = HashMap::from([
            ("num_agents", members.len().to_string()),
            (
                "agent_names",
                members
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ("agents", catalog.roster()),
        ]);

        Self {
            llm,
            model: catalog.supervisor().model.clone(),
            system_prompt: render_template(template, &values),
            members,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// JSON schema for the decision: `next` is restricted to the members plus
    /// the completion sentinel.
    pub fn decision_schema(&self) -> Value {
        let mut targets: Vec<&str> = self.members.iter().map(|m| m.as_str()).collect();
        targets.push(FINISH);
        json!({
            "type": "object",
            "properties": {
                "next": { "type": "string", "enum": targets },
                "instruction": { "type": "string" },
                "completion_summary": { "type": "string" }
            },
            "required": ["next", "instruction", "completion_summary"],
            "additionalProperties": false
        })
    }

    /// Decision request: system prompt followed by the whole conversation.
    fn build_request(&self, state: &RunState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(state.messages().len() + 1);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(state.messages().to_chat());
        messages
    }

    /// Parse and validate raw oracle text into a decision.
    ///
    /// The first embedded JSON object that has the decision's shape wins, so
    /// braces in surrounding prose do not hide it.
    pub fn parse_decision(&self, raw: &str) -> Result<RoutingDecision, RunError> {
        let text = strip_think_blocks(raw);
        if text.is_empty() {
            return Err(RunError::violation(NODE_NAME, "empty response", raw));
        }

        let mut syntax_error = None;
        let mut shape_error = None;
        let mut decision = None;
        for candidate in json_object_candidates(&text) {
            match serde_json::from_str::<RawDecision>(candidate) {
                Ok(parsed) => {
                    decision = Some(parsed);
                    break;
                }
                Err(e) if e.is_data() => {
                    shape_error.get_or_insert_with(|| e.to_string());
                }
                Err(e) => {
                    syntax_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        let decision = decision.ok_or_else(|| {
            let reason = shape_error
                .or(syntax_error)
                .unwrap_or_else(|| "no JSON object in response".to_string());
            RunError::violation(NODE_NAME, reason, raw)
        })?;

        let target = decision.next.trim();
        let next = if target == FINISH {
            Route::Finish
        } else {
            let id = self
                .members
                .iter()
                .find(|m| *m == target)
                .ok_or_else(|| {
                    RunError::violation(NODE_NAME, format!("unknown target '{}'", target), raw)
                })?;
            Route::Agent(id.clone())
        };

        if matches!(next, Route::Agent(_)) && decision.instruction.trim().is_empty() {
            return Err(RunError::violation(
                NODE_NAME,
                format!("empty instruction for '{}'", target),
                raw,
            ));
        }

        Ok(RoutingDecision {
            next,
            instruction: decision.instruction.trim().to_string(),
            completion_summary: decision.completion_summary.trim().to_string(),
        })
    }

    /// Ask the oracle for the next decision.
    pub async fn decide(&self, state: &RunState) -> Result<RoutingDecision, RunError> {
        let messages = self.build_request(state);
        let options = ChatOptions {
            temperature: Some(0.0),
            response_format: Some(ResponseFormat::json_schema(
                "routing_decision",
                self.decision_schema(),
            )),
        };

        let response = self
            .llm
            .chat_completion_with_options(&self.model, &messages, None, options)
            .await
            .map_err(|e| RunError::oracle(NODE_NAME, e))?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Supervisor decision usage"
            );
        }
        if response.is_truncated() {
            tracing::warn!("Supervisor decision hit the output token limit");
        }

        let raw = response.content.unwrap_or_default();
        self.parse_decision(&raw)
    }
}

#[async_trait]
impl Node for SupervisorNode {
    fn name(&self) -> &str {
        NODE_NAME
    }

    async fn invoke(&self, state: &RunState) -> Result<Command, RunError> {
        let decision = self.decide(state).await?;

        match decision.next {
            Route::Finish => {
                tracing::info!(
                    summary = %preview(&decision.completion_summary, 200),
                    "Supervisor declared the goal complete"
                );
                Ok(Command::finish())
            }
            Route::Agent(agent) => {
                tracing::info!(
                    agent = %agent,
                    instruction = %preview(&decision.instruction, 200),
                    "Supervisor delegating"
                );
                Ok(Command::delegate(agent, decision.instruction))
            }
        }
    }
}
