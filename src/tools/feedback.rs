//! Ask the human running the assistant a question and wait for the answer.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use super::Tool;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

pub struct HumanFeedback {
    input: Mutex<Input>,
}

impl HumanFeedback {
    /// Read answers from the process's standard input.
    pub fn stdin() -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn with_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(reader)),
        }
    }
}

/// The answer is typed on the same line as the `> ` cue.
fn render_prompt(query: &str) -> String {
    format!("\n[assistant asks] {}\n> ", query)
}

#[async_trait]
impl Tool for HumanFeedback {
    fn name(&self) -> &str {
        "human_feedback"
    }

    fn description(&self) -> &str {
        "Request assistance from a human. Use when a choice or detail only the user can provide is missing."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": { "type": "string", "description": "The question to ask." }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing string argument 'query'"))?;

        let mut input = self.input.lock().await;
        eprint!("{}", render_prompt(query));
        let mut line = String::new();
        let read = input.read_line(&mut line).await?;
        if read == 0 {
            anyhow::bail!("no answer: input closed");
        }
        Ok(json!({ "data": line.trim_end() }))
    }
}
