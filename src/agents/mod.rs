//! Agents module - the nodes of the delegation graph.
//!
//! # Node Types
//! - **SupervisorNode**: asks the oracle which agent acts next, or whether the
//!   goal is met
//! - **AgentNode**: runs a bounded tool-use loop for one catalog entry and
//!   reports a single summary
//!
//! # Contract
//! - Every node returns exactly one [`Command`]
//! - Agents always return to the supervisor; only the supervisor can finish
//! - Nodes append to the conversation; they never rewrite it

mod supervisor;
mod types;
mod worker;

pub use supervisor::{SupervisorNode, DEFAULT_SUPERVISOR_PROMPT};
pub use types::{Command, Route, RoutingDecision, RunError, StateUpdate, FINISH};
pub use worker::{AgentNode, ExecutionLoopResult};

use async_trait::async_trait;

use crate::conversation::RunState;

/// A state of the orchestration graph.
///
/// # Invariants
/// - `invoke()` never mutates `state`; changes travel in the returned `Command`
/// - Tool failures are handled inside the node; `Err` means the run must stop
#[async_trait]
pub trait Node: Send + Sync {
    /// Graph state name.
    fn name(&self) -> &str;

    /// Run the node against the current state.
    async fn invoke(&self, state: &RunState) -> Result<Command, RunError>;
}
