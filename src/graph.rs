//! Orchestration graph - the star-shaped state machine that drives a run.
//!
//! ```text
//!               __start__
//!                   |
//!                   v
//!   agent_a <-- supervisor --> agent_b
//!      |          ^   |  ^        |
//!      +----------+   |  +--------+
//!                     v
//!                  __end__
//! ```
//!
//! # Transitions
//! - `supervisor -> agent` for any member chosen by a routing decision
//! - `supervisor -> __end__` on completion
//! - `agent -> supervisor` always
//!
//! Nothing else is legal. Exactly one node runs at a time.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::agents::{AgentNode, Node, RunError, SupervisorNode};
use crate::catalog::{AgentCatalog, AgentId};
use crate::config::ConfigError;
use crate::conversation::{Goto, Message, RunState};
use crate::llm::LlmClient;
use crate::tools::ToolRegistry;

/// Default tool-use rounds per agent activation.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default supervisor decisions per run.
pub const DEFAULT_MAX_DELEGATIONS: usize = 25;

/// One executed node, streamed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub run_id: Uuid,
    /// 1-based step counter.
    pub step: usize,
    /// Name of the node that ran.
    pub node: String,
    pub goto: Goto,
    /// Messages the step appended.
    pub messages: Vec<Message>,
    /// Transcript length after the step.
    pub transcript_len: usize,
}

/// A run that reached the terminal state.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub messages: Vec<Message>,
    pub next: Goto,
    /// Nodes executed.
    pub steps: usize,
}

/// A run that stopped on a fatal error.
///
/// `messages` holds everything appended before the failure and `next` keeps
/// its last value, so an aborted run never looks finished.
#[derive(Debug, Clone, Error)]
#[error("run {run_id} aborted")]
pub struct RunFailure {
    pub run_id: Uuid,
    #[source]
    pub error: RunError,
    pub messages: Vec<Message>,
    pub next: Goto,
}

/// Wires a catalog, a tool registry and an oracle into a [`Graph`].
pub struct GraphBuilder<'a> {
    catalog: &'a AgentCatalog,
    tools: &'a ToolRegistry,
    llm: Arc<dyn LlmClient>,
    max_iterations: usize,
    max_delegations: usize,
    events: Option<broadcast::Sender<RunEvent>>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(catalog: &'a AgentCatalog, tools: &'a ToolRegistry, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            catalog,
            tools,
            llm,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_delegations: DEFAULT_MAX_DELEGATIONS,
            events: None,
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_delegations(mut self, max_delegations: usize) -> Self {
        self.max_delegations = max_delegations;
        self
    }

    /// Stream a [`RunEvent`] per step to `sender`.
    pub fn with_events(mut self, sender: broadcast::Sender<RunEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Construct every node.
    ///
    /// # Errors
    /// Any agent whose declared tools are not all registered, or a zero limit.
    pub fn build(self) -> Result<Graph, ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_iterations".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.max_delegations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_delegations".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let agents = self
            .catalog
            .members()
            .map(|spec| {
                AgentNode::new(
                    self.catalog,
                    spec,
                    self.tools,
                    Arc::clone(&self.llm),
                    self.max_iterations,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Graph '{}' ready: {} agents, max {} delegations, max {} iterations per agent",
            self.catalog.name(),
            agents.len(),
            self.max_delegations,
            self.max_iterations
        );

        Ok(Graph {
            name: self.catalog.name().to_string(),
            supervisor: SupervisorNode::new(self.catalog, self.llm),
            agents,
            max_delegations: self.max_delegations,
            events: self.events,
        })
    }
}

/// The compiled state machine. Immutable; one graph serves many runs.
pub struct Graph {
    name: String,
    supervisor: SupervisorNode,
    agents: Vec<AgentNode>,
    max_delegations: usize,
    events: Option<broadcast::Sender<RunEvent>>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.iter().map(|a| a.id())
    }

    fn agent(&self, id: &AgentId) -> Option<&AgentNode> {
        self.agents.iter().find(|a| a.id() == id)
    }

    /// Whether the star topology allows `from -> to`.
    pub fn transition_allowed(&self, from: &Goto, to: &Goto) -> bool {
        match (from, to) {
            (Goto::Supervisor, Goto::Terminal) => true,
            (Goto::Supervisor, Goto::Agent(id)) => self.agent(id).is_some(),
            (Goto::Agent(id), Goto::Supervisor) => self.agent(id).is_some(),
            _ => false,
        }
    }

    /// Run the graph from the supervisor with one user request.
    pub async fn run(&self, request: impl Into<String>) -> Result<RunOutcome, RunFailure> {
        let mut state = RunState::new(Message::user(request));
        let run_id = state.run_id;
        let span = tracing::info_span!("run", run_id = %run_id, graph = %self.name);

        match self.drive(&mut state).instrument(span).await {
            Ok(steps) => {
                let (messages, next) = state.into_parts();
                Ok(RunOutcome {
                    run_id,
                    messages,
                    next,
                    steps,
                })
            }
            Err(error) => {
                tracing::error!(run_id = %run_id, "Run aborted: {}", error);
                let (messages, next) = state.into_parts();
                Err(RunFailure {
                    run_id,
                    error,
                    messages,
                    next,
                })
            }
        }
    }

    /// Advance until the terminal state. Returns the number of steps taken.
    async fn drive(&self, state: &mut RunState) -> Result<usize, RunError> {
        let mut current = Goto::Supervisor;
        let mut decisions = 0;
        let mut step = 0;

        tracing::info!("Run started");
        while !current.is_terminal() {
            let node: &dyn Node = match &current {
                Goto::Supervisor => {
                    if decisions >= self.max_delegations {
                        return Err(RunError::DelegationLimit(self.max_delegations));
                    }
                    decisions += 1;
                    &self.supervisor
                }
                Goto::Agent(id) => match self.agent(id) {
                    Some(agent) => agent,
                    None => {
                        return Err(RunError::InvalidTransition {
                            from: Goto::Supervisor,
                            to: current.clone(),
                        })
                    }
                },
                Goto::Terminal => break,
            };

            step += 1;
            let command = node.invoke(state).await?;
            if !self.transition_allowed(&current, &command.goto) {
                return Err(RunError::InvalidTransition {
                    from: current,
                    to: command.goto,
                });
            }

            tracing::info!(step, node = node.name(), goto = %command.goto, "Step complete");
            let appended = command.update.messages.clone();
            state.apply(command.update);
            self.emit(RunEvent {
                run_id: state.run_id,
                step,
                node: node.name().to_string(),
                goto: command.goto.clone(),
                messages: appended,
                transcript_len: state.messages().len(),
            });
            current = command.goto;
        }

        tracing::info!(steps = step, messages = state.messages().len(), "Run finished");
        Ok(step)
    }

    fn emit(&self, event: RunEvent) {
        if let Some(ref events) = self.events {
            // No subscribers is fine.
            let _ = events.send(event);
        }
    }

    /// Render the topology as a Mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec![
            "graph TD;".to_string(),
            "\t__start__([__start__]) --> supervisor;".to_string(),
        ];
        for agent in &self.agents {
            lines.push(format!("\tsupervisor -.-> {};", agent.id()));
            lines.push(format!("\t{} --> supervisor;", agent.id()));
        }
        lines.push("\tsupervisor -.-> __end__([__end__]);".to_string());
        lines.join("\n")
    }
}
