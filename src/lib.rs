//! # homebase
//!
//! Personal assistant built as a team of small agents. A supervisor reads the
//! conversation and hands one self-contained instruction at a time to a
//! specialist agent (contacts, calendar, mail, ...). Each agent works through
//! its instruction with its own tools and reports back with one summary. The
//! supervisor repeats until it judges the user's goal met.
//!
//! ## Architecture
//!
//! ```text
//!   user request
//!        │
//!        ▼
//!  ┌────────────┐  instruction   ┌──────────────┐   tool calls   ┌──────────────┐
//!  │ Supervisor │ ─────────────► │  AgentNode   │ ─────────────► │ ToolRegistry │
//!  │    Node    │ ◄───────────── │ (per agent)  │ ◄───────────── │              │
//!  └─────┬──────┘    summary     └──────────────┘  observations  └──────────────┘
//!        │ FINISH
//!        ▼
//!     __end__
//! ```
//!
//! ## Modules
//! - `catalog`: agent roster loaded from YAML
//! - `conversation`: append-only message log and run state
//! - `agents`: supervisor and agent nodes, routing types, run errors
//! - `graph`: the state machine that drives a run
//! - `llm`: decision oracle client (OpenAI-compatible)
//! - `tools`: tool trait, registry and built-in tools
//! - `config`: environment configuration

pub mod agents;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod graph;
pub mod llm;
pub mod tools;
pub mod util;

#[cfg(test)]
mod testing;

pub use catalog::{AgentCatalog, AgentId, AgentSpec};
pub use config::{Config, ConfigError};
pub use conversation::{Author, Goto, Message};
pub use graph::{Graph, GraphBuilder, RunEvent, RunFailure, RunOutcome};
