//! Shared conversation state for a single run.
//!
//! # Invariants
//! - The transcript is append-only: nodes can read every message but no API
//!   hands out mutable access to an existing entry.
//! - `RunState::next` only changes through a node's `StateUpdate`.

use serde::Serialize;
use uuid::Uuid;

use crate::agents::StateUpdate;
use crate::catalog::AgentId;
use crate::llm::{ChatMessage, Role};

/// Who wrote a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", content = "name", rename_all = "snake_case")]
pub enum Author {
    /// The person who started the run.
    User,
    /// A supervisor instruction addressed to the next agent.
    Instruction,
    /// A summary produced by a specific agent.
    Agent(AgentId),
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Instruction => write!(f, "instruction"),
            Author::Agent(id) => write!(f, "{}", id),
        }
    }
}

/// An entry in the shared conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub author: Author,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            content: content.into(),
        }
    }

    pub fn instruction(content: impl Into<String>) -> Self {
        Self {
            author: Author::Instruction,
            content: content.into(),
        }
    }

    pub fn agent(id: AgentId, content: impl Into<String>) -> Self {
        Self {
            author: Author::Agent(id),
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match &message.author {
            Author::User => ChatMessage::new(Role::User, &message.content),
            Author::Instruction => ChatMessage::new(Role::System, &message.content),
            Author::Agent(id) => {
                ChatMessage::new(Role::Assistant, &message.content).with_name(id.as_str())
            }
        }
    }
}

/// Append-only ordered message log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent supervisor instruction, if any.
    pub fn last_instruction(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.author == Author::Instruction)
    }

    /// Render the log as chat messages for the oracle.
    pub fn to_chat(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ChatMessage::from).collect()
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// A node of the orchestration graph, used both as a command target and as the
/// `next` field of the run state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Goto {
    Supervisor,
    Agent(AgentId),
    Terminal,
}

impl Goto {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Goto::Terminal)
    }
}

impl std::fmt::Display for Goto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Goto::Supervisor => write!(f, "supervisor"),
            Goto::Agent(id) => write!(f, "{}", id),
            Goto::Terminal => write!(f, "__end__"),
        }
    }
}

/// Per-run state: the conversation so far plus the current routing target.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    messages: Transcript,
    next: Goto,
}

impl RunState {
    /// Start a run from the initiating user message.
    pub fn new(request: Message) -> Self {
        let mut messages = Transcript::new();
        messages.push(request);
        Self {
            run_id: Uuid::new_v4(),
            messages,
            next: Goto::Supervisor,
        }
    }

    pub fn messages(&self) -> &Transcript {
        &self.messages
    }

    pub fn next(&self) -> &Goto {
        &self.next
    }

    /// Apply a node's update: messages are appended, `next` replaced if set.
    pub(crate) fn apply(&mut self, update: StateUpdate) {
        for message in update.messages {
            self.messages.push(message);
        }
        if let Some(next) = update.next {
            self.next = next;
        }
    }

    pub fn into_parts(self) -> (Vec<Message>, Goto) {
        (self.messages.into_vec(), self.next)
    }
}
