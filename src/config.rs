//! Configuration management for homebase.
//!
//! Runtime settings come from environment variables (a `.env` file is read
//! first when present):
//! - `HOMEBASE_CONFIG` - Optional. Agent catalog YAML path. Defaults to `app_config.yaml`.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible endpoint. Defaults to `http://localhost:11434/v1`.
//! - `LLM_API_KEY` - Optional. Bearer token for the endpoint.
//! - `MAX_ITERATIONS` - Optional. Tool-use rounds per agent invocation. Defaults to `10`.
//! - `MAX_DELEGATIONS` - Optional. Supervisor decisions per run. Defaults to `25`.
//! - `TIMEZONE_OFFSET_HOURS` - Optional. Fixed UTC offset for the clock tool. Defaults to local time.
//!
//! The agent roster itself lives in the catalog file, see [`crate::catalog`].

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::{DEFAULT_MAX_DELEGATIONS, DEFAULT_MAX_ITERATIONS};

/// Configuration errors. All of them are raised while building the graph,
/// never during a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to read catalog {path}: {source}")]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Agent '{agent}' declares tool '{tool}' but no such tool is registered")]
    UnknownTool { agent: String, tool: String },

    #[error("Agent '{0}' is not declared in the catalog")]
    UnknownAgent(String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the agent catalog YAML
    pub catalog_path: PathBuf,

    /// OpenAI-compatible base URL for the decision oracle
    pub llm_base_url: String,

    /// Optional API key for the oracle endpoint
    pub llm_api_key: Option<String>,

    /// Maximum tool-use rounds per agent invocation
    pub max_iterations: usize,

    /// Maximum supervisor decisions per run
    pub max_delegations: usize,

    /// Fixed UTC offset for date/time tools; `None` means local time
    pub timezone_offset_hours: Option<i32>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
    /// or a limit is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let catalog_path = std::env::var("HOMEBASE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("app_config.yaml"));

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
        url::Url::parse(&llm_base_url)
            .map_err(|e| ConfigError::InvalidValue("LLM_BASE_URL".to_string(), e.to_string()))?;

        let llm_api_key = std::env::var("LLM_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let max_iterations = parse_limit("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        let max_delegations = parse_limit("MAX_DELEGATIONS", DEFAULT_MAX_DELEGATIONS)?;

        let timezone_offset_hours = match std::env::var("TIMEZONE_OFFSET_HOURS") {
            Ok(raw) => Some(parse_offset(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            catalog_path,
            llm_base_url,
            llm_api_key,
            max_iterations,
            max_delegations,
            timezone_offset_hours,
        })
    }

    /// Create a config with default limits (useful for testing).
    pub fn new(catalog_path: PathBuf, llm_base_url: String) -> Self {
        Self {
            catalog_path,
            llm_base_url,
            llm_api_key: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_delegations: DEFAULT_MAX_DELEGATIONS,
            timezone_offset_hours: None,
        }
    }
}

fn parse_limit(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_limit_value(name, &raw),
        Err(_) => Ok(default),
    }
}

/// A loop limit must be a positive integer.
fn parse_limit_value(name: &str, raw: &str) -> Result<usize, ConfigError> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn parse_offset(raw: &str) -> Result<i32, ConfigError> {
    let hours: i32 = raw.trim().parse().map_err(|e| {
        ConfigError::InvalidValue("TIMEZONE_OFFSET_HOURS".to_string(), format!("{}", e))
    })?;
    if !(-23..=23).contains(&hours) {
        return Err(ConfigError::InvalidValue(
            "TIMEZONE_OFFSET_HOURS".to_string(),
            format!("{} is outside -23..=23", hours),
        ));
    }
    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_bounds_are_checked() {
        assert_eq!(parse_offset("1").unwrap(), 1);
        assert_eq!(parse_offset(" -5 ").unwrap(), -5);
        assert!(parse_offset("24").is_err());
        assert!(parse_offset("one").is_err());
    }

    #[test]
    fn limits_must_be_positive_integers() {
        assert_eq!(parse_limit_value("MAX_DELEGATIONS", " 40 ").unwrap(), 40);

        let zero = parse_limit_value("MAX_DELEGATIONS", "0").unwrap_err();
        assert!(matches!(zero, ConfigError::InvalidValue(ref name, _) if name == "MAX_DELEGATIONS"));
        assert!(zero.to_string().contains("greater than zero"));

        let word = parse_limit_value("MAX_ITERATIONS", "ten").unwrap_err();
        assert!(matches!(word, ConfigError::InvalidValue(ref name, _) if name == "MAX_ITERATIONS"));
        assert!(parse_limit_value("MAX_ITERATIONS", "-3").is_err());
    }

    #[test]
    fn new_uses_default_limits() {
        let config = Config::new(PathBuf::from("app_config.yaml"), "http://localhost:11434/v1".into());
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_delegations, 25);
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn unknown_tool_error_names_agent_and_tool() {
        let err = ConfigError::UnknownTool {
            agent: "contact_agent".to_string(),
            tool: "get_contacts".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Agent 'contact_agent' declares tool 'get_contacts' but no such tool is registered"
        );
    }
}
