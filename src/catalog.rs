//! Agent catalog: the static roster of agents loaded at startup.
//!
//! The catalog is a YAML document:
//!
//! ```yaml
//! name: Home Assistant
//! supervisor:
//!   model: deepseek-r1:7b
//! members: [contact_agent]
//! agents:
//!   contact_agent:
//!     description: Looks up contacts
//!     model: llama3.1
//!     history: full
//!     tools:
//!       - "get_contacts(): Fetch every contact"
//!     prompt: "You have {num_tools} tools:\n{tools_list}"
//! remote_tools:
//!   get_contacts:
//!     url: http://localhost:8080/tools/get_contacts
//!     description: Fetch every contact
//! ```
//!
//! Agent prompt templates recognize `{num_tools}`, `{tools_list}` and
//! `{agents_list}`. Other `{...}` sequences are left untouched.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::config::ConfigError;

/// Names the graph reserves for its own states and the completion sentinel.
pub const RESERVED_IDS: &[&str] = &["supervisor", "FINISH", "__start__", "__end__"];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));

/// Identifier of an agent that is a member of the loaded catalog.
///
/// Only the catalog hands these out, so holding an `AgentId` means the agent
/// exists in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(Arc<str>);

impl AgentId {
    pub(crate) fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for AgentId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// How much of the shared conversation an agent sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// The whole message log.
    #[default]
    Full,
    /// Only the most recent supervisor instruction. Suits small models.
    LastInstruction,
}

/// A tool as declared in the catalog: `name(args): description`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRef {
    /// Registry identifier, the text before the first `(`.
    pub id: String,
    /// The declaration as written, shown to the model in prompts.
    pub declaration: String,
}

impl ToolRef {
    pub fn parse(declaration: &str) -> Self {
        Self {
            id: parse_tool_name(declaration).to_string(),
            declaration: declaration.trim().to_string(),
        }
    }
}

/// Extract the tool identifier from a declaration like
/// `read_file(file_path: str): Reads the file`.
pub fn parse_tool_name(declaration: &str) -> &str {
    declaration
        .split_once('(')
        .map_or(declaration, |(name, _)| name)
        .trim()
}

/// One agent's static declaration. Immutable after load.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: AgentId,
    pub description: String,
    pub model: String,
    pub tools: Vec<ToolRef>,
    pub prompt_template: String,
    pub history: HistoryMode,
}

impl AgentSpec {
    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.id.as_str())
    }
}

/// Supervisor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    pub model: String,
    /// Optional system prompt template; `{num_agents}`, `{agent_names}` and
    /// `{agents}` are substituted.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Raw agent entry as it appears in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name; informational, the mapping key is the identifier.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub history: HistoryMode,
}

/// An HTTP-backed tool declared in the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolConfig {
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema for the arguments; defaults to an open object.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    name: Option<String>,
    supervisor: SupervisorConfig,
    #[serde(default)]
    members: Option<Vec<String>>,
    /// Kept as a mapping so declaration order survives.
    agents: serde_yaml::Mapping,
    #[serde(default)]
    remote_tools: serde_yaml::Mapping,
}

/// The loaded, validated roster.
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    name: String,
    supervisor: SupervisorConfig,
    /// Every declared agent, in declaration order.
    agents: Vec<AgentSpec>,
    /// Agents that take part in the graph, in roster order.
    members: Vec<AgentId>,
    remote_tools: Vec<(String, RemoteToolConfig)>,
}

impl AgentCatalog {
    /// Read and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadCatalog {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&raw)?;
        tracing::info!(
            "Loaded catalog '{}' from {}: {} agents, {} members",
            catalog.name,
            path.display(),
            catalog.agents.len(),
            catalog.members.len()
        );
        Ok(catalog)
    }

    /// Parse and validate a catalog from YAML text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::MalformedCatalog(e.to_string()))?;

        let mut agents = Vec::with_capacity(file.agents.len());
        for (key, value) in file.agents {
            let id = key.as_str().ok_or_else(|| {
                ConfigError::MalformedCatalog("agent keys must be strings".to_string())
            })?;
            let config: AgentConfig = serde_yaml::from_value(value)
                .map_err(|e| ConfigError::MalformedCatalog(format!("agent '{}': {}", id, e)))?;
            agents.push(build_spec(id, config)?);
        }

        let mut remote_tools = Vec::with_capacity(file.remote_tools.len());
        for (key, value) in file.remote_tools {
            let name = key.as_str().ok_or_else(|| {
                ConfigError::MalformedCatalog("remote tool keys must be strings".to_string())
            })?;
            let config: RemoteToolConfig = serde_yaml::from_value(value).map_err(|e| {
                ConfigError::MalformedCatalog(format!("remote tool '{}': {}", name, e))
            })?;
            remote_tools.push((name.to_string(), config));
        }

        Self::new(
            file.name.unwrap_or_else(|| "homebase".to_string()),
            file.supervisor,
            agents,
            file.members,
            remote_tools,
        )
    }

    fn new(
        name: String,
        supervisor: SupervisorConfig,
        agents: Vec<AgentSpec>,
        members: Option<Vec<String>>,
        remote_tools: Vec<(String, RemoteToolConfig)>,
    ) -> Result<Self, ConfigError> {
        if supervisor.model.trim().is_empty() {
            return Err(ConfigError::InvalidCatalog(
                "supervisor.model must not be empty".to_string(),
            ));
        }

        let members = match members {
            Some(names) => {
                let mut ids: Vec<AgentId> = Vec::with_capacity(names.len());
                for name in names {
                    let spec = agents
                        .iter()
                        .find(|a| a.id == name.as_str())
                        .ok_or_else(|| ConfigError::UnknownAgent(name.clone()))?;
                    if ids.contains(&spec.id) {
                        return Err(ConfigError::InvalidCatalog(format!(
                            "member '{}' listed twice",
                            name
                        )));
                    }
                    ids.push(spec.id.clone());
                }
                ids
            }
            None => agents.iter().map(|a| a.id.clone()).collect(),
        };

        if members.is_empty() {
            return Err(ConfigError::InvalidCatalog(
                "the roster has no member agents".to_string(),
            ));
        }

        Ok(Self {
            name,
            supervisor,
            agents,
            members,
            remote_tools,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supervisor(&self) -> &SupervisorConfig {
        &self.supervisor
    }

    /// Every declared agent, members or not.
    pub fn list_agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    /// Agents that take part in the graph.
    pub fn members(&self) -> impl Iterator<Item = &AgentSpec> {
        self.members
            .iter()
            .filter_map(|id| self.agents.iter().find(|a| &a.id == id))
    }

    pub fn member_ids(&self) -> &[AgentId] {
        &self.members
    }

    pub fn remote_tools(&self) -> &[(String, RemoteToolConfig)] {
        &self.remote_tools
    }

    /// Look up a member agent by identifier.
    pub fn get(&self, id: &str) -> Option<&AgentSpec> {
        self.members().find(|a| a.id == id)
    }

    /// Resolve a textual identifier to a member `AgentId`.
    pub fn agent_id(&self, id: &str) -> Result<AgentId, ConfigError> {
        self.get(id)
            .map(|a| a.id.clone())
            .ok_or_else(|| ConfigError::UnknownAgent(id.to_string()))
    }

    /// Render an agent's prompt template.
    pub fn render_prompt(&self, spec: &AgentSpec) -> String {
        let tools_list = spec
            .tools
            .iter()
            .map(|t| format!("   - {}", t.declaration))
            .collect::<Vec<_>>()
            .join("\n");
        let agents_list = self
            .agents
            .iter()
            .map(|a| format!("- {}: {}", a.id, a.description))
            .collect::<Vec<_>>()
            .join("\n");

        let values = HashMap::from([
            ("num_tools", spec.tools.len().to_string()),
            ("tools_list", tools_list),
            ("agents_list", agents_list),
        ]);
        render_template(&spec.prompt_template, &values)
    }

    /// Roster block for the supervisor prompt: each member with its
    /// description and declared tools.
    pub fn roster(&self) -> String {
        let mut lines = Vec::new();
        for spec in self.members() {
            lines.push(format!("{}: {}", spec.id, spec.description));
            for tool in &spec.tools {
                lines.push(format!("- {}", tool.declaration));
            }
            lines.push(String::new());
        }
        lines.join("\n").trim_end().to_string()
    }
}

fn build_spec(id: &str, config: AgentConfig) -> Result<AgentSpec, ConfigError> {
    validate_id(id)?;
    if config.model.trim().is_empty() {
        return Err(ConfigError::InvalidCatalog(format!(
            "agent '{}' has an empty model",
            id
        )));
    }

    let tools: Vec<ToolRef> = config.tools.iter().map(|t| ToolRef::parse(t)).collect();
    if let Some(bad) = tools.iter().find(|t| t.id.is_empty()) {
        return Err(ConfigError::InvalidCatalog(format!(
            "agent '{}' has a tool entry without a name: '{}'",
            id, bad.declaration
        )));
    }

    Ok(AgentSpec {
        id: AgentId::new(id),
        description: config
            .description
            .unwrap_or_else(|| "No description available".to_string()),
        model: config.model,
        tools,
        prompt_template: config.prompt,
        history: config.history,
    })
}

/// Agent ids double as chat participant names, so they are restricted to
/// `[A-Za-z0-9_-]`.
fn validate_id(id: &str) -> Result<(), ConfigError> {
    if RESERVED_IDS.contains(&id) {
        return Err(ConfigError::InvalidCatalog(format!(
            "'{}' is reserved and cannot be an agent id",
            id
        )));
    }
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ConfigError::InvalidCatalog(format!(
            "invalid agent id '{}': use letters, digits, '_' or '-'",
            id
        )));
    }
    Ok(())
}

/// Substitute `{key}` placeholders; unknown keys stay as written.
pub(crate) fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"
name: Home Assistant
supervisor:
  model: deepseek-r1:7b
agents:
  contact_agent:
    description: Looks up contacts
    model: llama3.1
    tools:
      - "get_contacts(): Fetch every contact"
      - "get_single_contact(query: str): Find one contact"
    prompt: "You have {num_tools} tools:\n{tools_list}\nTeam:\n{agents_list}\nKeep {braces}."
  email_agent:
    description: Sends and reads mail
    model: llama3.1
    history: last_instruction
    tools:
      - "send_email(to: str, body: str): Send a message"
remote_tools:
  get_contacts:
    url: http://localhost:8080/tools/get_contacts
    description: Fetch every contact
"#;

    #[test]
    fn parse_tool_name_takes_text_before_paren() {
        assert_eq!(parse_tool_name("read_file(file_path: str): Reads"), "read_file");
        assert_eq!(parse_tool_name("  get_contacts  "), "get_contacts");
        assert_eq!(parse_tool_name("check_emails(): x (y)"), "check_emails");
    }

    #[test]
    fn loads_agents_in_declaration_order() {
        let catalog = AgentCatalog::from_yaml_str(CATALOG).unwrap();
        assert_eq!(catalog.name(), "Home Assistant");
        let ids: Vec<_> = catalog.members().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, vec!["contact_agent", "email_agent"]);
        assert_eq!(catalog.supervisor().model, "deepseek-r1:7b");
        assert_eq!(catalog.remote_tools().len(), 1);

        let email = catalog.get("email_agent").unwrap();
        assert_eq!(email.history, HistoryMode::LastInstruction);
        assert_eq!(email.tool_ids().collect::<Vec<_>>(), vec!["send_email"]);
        assert_eq!(
            catalog.get("contact_agent").unwrap().history,
            HistoryMode::Full
        );
    }

    #[test]
    fn renders_prompt_placeholders() {
        let catalog = AgentCatalog::from_yaml_str(CATALOG).unwrap();
        let prompt = catalog.render_prompt(catalog.get("contact_agent").unwrap());
        assert!(prompt.starts_with("You have 2 tools:\n   - get_contacts(): Fetch every contact\n"));
        assert!(prompt.contains("   - get_single_contact(query: str): Find one contact"));
        assert!(prompt.contains("- email_agent: Sends and reads mail"));
        assert!(prompt.ends_with("Keep {braces}."));
    }

    #[test]
    fn roster_lists_members_with_tools() {
        let catalog = AgentCatalog::from_yaml_str(CATALOG).unwrap();
        let roster = catalog.roster();
        assert!(roster.starts_with(
            "contact_agent: Looks up contacts\n- get_contacts(): Fetch every contact\n"
        ));
        assert!(roster.ends_with("email_agent: Sends and reads mail\n- send_email(to: str, body: str): Send a message"));
    }

    #[test]
    fn members_restrict_the_roster() {
        let raw = CATALOG.replace(
            "supervisor:\n  model: deepseek-r1:7b\n",
            "supervisor:\n  model: deepseek-r1:7b\nmembers: [email_agent]\n",
        );
        let catalog = AgentCatalog::from_yaml_str(&raw).unwrap();
        assert_eq!(catalog.member_ids().len(), 1);
        assert!(catalog.get("contact_agent").is_none());
        assert!(matches!(
            catalog.agent_id("contact_agent"),
            Err(ConfigError::UnknownAgent(_))
        ));
        // Non-members are still visible to prompts.
        assert_eq!(catalog.list_agents().len(), 2);
    }

    #[test]
    fn unknown_member_is_configuration_error() {
        let raw = CATALOG.replace(
            "supervisor:\n  model: deepseek-r1:7b\n",
            "supervisor:\n  model: deepseek-r1:7b\nmembers: [calendar_agent]\n",
        );
        let err = AgentCatalog::from_yaml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgent(name) if name == "calendar_agent"));
    }

    #[test]
    fn reserved_ids_are_rejected() {
        let raw = r#"
supervisor: { model: m }
agents:
  FINISH: { model: m }
"#;
        let err = AgentCatalog::from_yaml_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCatalog(msg) if msg.contains("reserved")));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let raw = r#"
supervisor: { model: m }
agents:
  "contact agent": { model: m }
"#;
        assert!(matches!(
            AgentCatalog::from_yaml_str(raw),
            Err(ConfigError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn empty_roster_is_rejected() {
        let raw = "supervisor: { model: m }\nagents: {}\n";
        assert!(matches!(
            AgentCatalog::from_yaml_str(raw),
            Err(ConfigError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn unknown_agent_field_is_malformed() {
        let raw = r#"
supervisor: { model: m }
agents:
  a: { model: m, toolz: [] }
"#;
        assert!(matches!(
            AgentCatalog::from_yaml_str(raw),
            Err(ConfigError::MalformedCatalog(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let catalog = AgentCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.member_ids().len(), 2);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = AgentCatalog::load(Path::new("/nonexistent/app_config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadCatalog { .. }));
        assert!(err.to_string().contains("/nonexistent/app_config.yaml"));
    }

    #[test]
    fn agent_id_serializes_as_plain_string() {
        let catalog = AgentCatalog::from_yaml_str(CATALOG).unwrap();
        let id = catalog.agent_id("contact_agent").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("contact_agent"));
    }

    #[test]
    fn render_template_leaves_unknown_placeholders() {
        let values = HashMap::from([("a", "1".to_string())]);
        assert_eq!(render_template("{a} {b} {}", &values), "1 {b} {}");
    }
}
