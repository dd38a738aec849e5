//! Core types for the delegation loop.

use thiserror::Error;

use crate::catalog::AgentId;
use crate::conversation::{Goto, Message};

/// Completion sentinel the supervisor emits instead of an agent id.
pub const FINISH: &str = "FINISH";

/// Where the supervisor sends control next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Agent(AgentId),
    Finish,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Agent(id) => write!(f, "{}", id),
            Route::Finish => f.write_str(FINISH),
        }
    }
}

/// The supervisor's structured decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub next: Route,
    /// Self-contained instruction for the chosen agent.
    pub instruction: String,
    /// Informational progress summary.
    pub completion_summary: String,
}

/// State changes requested by a node. Messages are appended, never replace
/// history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub next: Option<Goto>,
}

/// What every node returns: exactly one target plus a state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub goto: Goto,
    pub update: StateUpdate,
}

impl Command {
    /// End the run. No messages are appended.
    pub fn finish() -> Self {
        Self {
            goto: Goto::Terminal,
            update: StateUpdate {
                messages: Vec::new(),
                next: Some(Goto::Terminal),
            },
        }
    }

    /// Hand control to `agent` with one instruction message.
    pub fn delegate(agent: AgentId, instruction: impl Into<String>) -> Self {
        Self {
            goto: Goto::Agent(agent.clone()),
            update: StateUpdate {
                messages: vec![Message::instruction(instruction)],
                next: Some(Goto::Agent(agent)),
            },
        }
    }

    /// Return control to the supervisor with the agent's summary.
    pub fn report(summary: Message) -> Self {
        Self {
            goto: Goto::Supervisor,
            update: StateUpdate {
                messages: vec![summary],
                next: None,
            },
        }
    }
}

/// Fatal run conditions. Tool failures never show up here.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The oracle answered, but not in the required shape.
    #[error("{node}: oracle output violates the contract: {reason}; raw output: {raw:?}")]
    OracleContractViolation {
        node: String,
        reason: String,
        raw: String,
    },

    /// The oracle call itself failed (after any adapter retries).
    #[error("{node}: decision oracle call failed: {message}")]
    Oracle { node: String, message: String },

    #[error("delegation limit reached: {0} supervisor decisions without finishing")]
    DelegationLimit(usize),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: Goto, to: Goto },
}

impl RunError {
    pub(crate) fn violation(node: &str, reason: impl Into<String>, raw: impl Into<String>) -> Self {
        RunError::OracleContractViolation {
            node: node.to_string(),
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub(crate) fn oracle(node: &str, error: anyhow::Error) -> Self {
        RunError::Oracle {
            node: node.to_string(),
            message: format!("{:#}", error),
        }
    }
}
