//! HTTP-backed tools.
//!
//! Calendar, mail, spreadsheet and notes integrations run as separate
//! services. A `RemoteTool` forwards the model's JSON arguments to one endpoint
//! and hands the response back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::Tool;
use crate::catalog::RemoteToolConfig;
use crate::config::ConfigError;
use crate::util::preview;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RemoteTool {
    name: String,
    description: String,
    parameters: Value,
    url: url::Url,
    client: Client,
}

impl RemoteTool {
    pub fn from_config(name: &str, config: &RemoteToolConfig) -> Result<Self, ConfigError> {
        let url = url::Url::parse(&config.url).map_err(|e| {
            ConfigError::InvalidCatalog(format!("remote tool '{}' has a bad url: {}", name, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidCatalog(format!(
                "remote tool '{}' must use http or https, got '{}'",
                name,
                url.scheme()
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("remote tool '{}'", name), e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            parameters: config
                .parameters
                .clone()
                .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            url,
            client,
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

/// JSON bodies are returned as-is, anything else as a string.
fn decode_body(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        tracing::debug!("Calling remote tool {} at {}", self.name, self.url);
        let response = self
            .client
            .post(self.url.clone())
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("HTTP {}: {}", status.as_u16(), preview(&body, 500));
        }
        Ok(decode_body(body))
    }
}
