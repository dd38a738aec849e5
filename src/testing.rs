//! Test doubles: a scripted oracle and stub tools.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::{AgentCatalog, AgentId};
use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, ResponseFormat, ToolDefinition};
use crate::tools::Tool;

/// Two agents: `contact_agent` (full history) and `email_agent` (last
/// instruction only), each on its own model.
pub const CONTACT_CATALOG: &str = r#"
name: Contacts
supervisor:
  model: supervisor-model
agents:
  contact_agent:
    description: Looks up contacts
    model: contact-model
    tools:
      - "get_contacts(): Fetch every contact"
    prompt: "You manage contacts with {num_tools} tools:\n{tools_list}"
  email_agent:
    description: Sends mail
    model: email-model
    history: last_instruction
    tools:
      - "send_email(to: str, body: str): Send a message"
    prompt: "You send email."
"#;

pub fn agent_id(id: &str) -> AgentId {
    AgentId::new(id)
}

pub fn catalog(raw: &str) -> AgentCatalog {
    AgentCatalog::from_yaml_str(raw).unwrap()
}

/// A supervisor reply routing to `next`.
pub fn decision(next: &str, instruction: &str) -> ChatResponse {
    ChatResponse::text(
        json!({
            "next": next,
            "instruction": instruction,
            "completion_summary": ""
        })
        .to_string(),
    )
}

/// One request as the oracle saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
    pub response_format: Option<ResponseFormat>,
}

/// Replays canned responses per model and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<String, VecDeque<Result<ChatResponse, String>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, responses: Vec<ChatResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(responses.into_iter().map(Ok));
        self
    }

    pub fn script_error(self, model: &str, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tool_names: tools
                .unwrap_or(&[])
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
            response_format: options.response_format,
        });

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted response left for model '{}'", model)),
        }
    }
}

/// Returns a fixed value and remembers the arguments of every call.
pub struct RecordingTool {
    name: String,
    result: Value,
    calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn new(name: &str, result: Value) -> Self {
        Self {
            name: name.to_string(),
            result,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Recording stub"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        self.calls.lock().unwrap().push(args);
        Ok(self.result.clone())
    }
}

/// Always fails with the same message.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Failing stub"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        anyhow::bail!("{}", self.message)
    }
}

/// Succeeds only when called with the expected arguments.
pub struct FlakyTool {
    name: String,
    expected: Value,
    result: Value,
}

impl FlakyTool {
    pub fn new(name: &str, expected: Value, result: Value) -> Self {
        Self {
            name: name.to_string(),
            expected,
            result,
        }
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Flaky stub"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        if args != self.expected {
            anyhow::bail!("bad request: expected {}, got {}", self.expected, args);
        }
        Ok(self.result.clone())
    }
}
