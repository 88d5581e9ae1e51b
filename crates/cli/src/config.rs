//! Configuration loading from tether.toml.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use mcp::{Endpoint, ServerConfig};
use runtime::{AgentConfig, SessionConfig};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "tether.toml";

/// Top-level configuration. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub server: ServerSection,
    pub agent: AgentSection,
}

/// Model backend settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider name (currently only "ollama" supported).
    pub provider: String,
    pub name: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            name: "llama3.2:latest".to_string(),
            base_url: runtime::providers::DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Sse,
    Stdio,
    Tcp,
}

/// How to reach the tool server.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub transport: TransportKind,
    /// SSE endpoint.
    pub url: Option<String>,
    /// Command to spawn for stdio.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// `host:port` for tcp.
    pub address: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            transport: TransportKind::Sse,
            url: Some("http://localhost:8000/sse".to_string()),
            command: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            address: None,
        }
    }
}

/// Conversation loop settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_rounds: usize,
    pub system_prompt: Option<String>,
    pub connect_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            max_rounds: runtime::DEFAULT_MAX_ROUNDS,
            system_prompt: None,
            connect_timeout_secs: session.connect_timeout.as_secs(),
            call_timeout_secs: session.call_timeout.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if given, else `tether.toml` if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.model.provider != "ollama" {
            return Err(ConfigError::UnsupportedProvider(config.model.provider));
        }
        Ok(config)
    }

    /// The tool server endpoint for the selected transport.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let server = &self.server;
        let missing = |field| ConfigError::MissingField {
            transport: server.transport,
            field,
        };

        match server.transport {
            TransportKind::Sse => {
                let url = server.url.clone().ok_or_else(|| missing("url"))?;
                Ok(Endpoint::Sse(url))
            }
            TransportKind::Stdio => {
                let command = server.command.clone().ok_or_else(|| missing("command"))?;
                Ok(Endpoint::Stdio(ServerConfig {
                    command,
                    args: server.args.clone(),
                    env: server.env.clone().into_iter().collect(),
                }))
            }
            TransportKind::Tcp => {
                let address = server.address.clone().ok_or_else(|| missing("address"))?;
                Ok(Endpoint::Tcp(address))
            }
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.agent.connect_timeout_secs),
            call_timeout: Duration::from_secs(self.agent.call_timeout_secs),
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_rounds: self.agent.max_rounds,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unsupported model provider `{0}`: only \"ollama\" is available")]
    UnsupportedProvider(String),

    #[error("server.{field} is required for the {transport:?} transport")]
    MissingField {
        transport: TransportKind,
        field: &'static str,
    },
}
