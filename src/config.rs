//! Configuration for the dispatch service
//!
//! Loaded from a TOML file. Secrets are never stored in the file; it names the
//! environment variables that hold them.
//!
//! ```toml
//! [service]
//! id = "hr-dispatch"
//! port = 8080
//!
//! [service.activity_log]
//! sink = "json_lines"
//! path = "/var/log/hr-dispatch/activity.jsonl"
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [payroll]
//! minimum_wage = "1700.00"
//!
//! [payroll.zakat_region_rates]
//! selangor = "0.025"
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::llm::OpenAiConfig;
use crate::payroll::{RatesError, StatutoryRates};
use crate::task::TaskKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    pub service: ServiceSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub payroll: StatutoryRates,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Service identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub activity_log: ActivityLogSection,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySinkKind {
    #[default]
    Tracing,
    JsonLines,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogSection {
    #[serde(default)]
    pub sink: ActivitySinkKind,
    /// Output file, required for `json_lines`
    pub path: Option<PathBuf>,
    #[serde(default = "default_activity_capacity")]
    pub capacity: usize,
}

impl Default for ActivityLogSection {
    fn default() -> Self {
        Self {
            sink: ActivitySinkKind::default(),
            path: None,
            capacity: default_activity_capacity(),
        }
    }
}

fn default_activity_capacity() -> usize {
    crate::handler::activity::DEFAULT_ACTIVITY_CAPACITY
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name; only "openai" (and compatible endpoints) is supported
    pub provider: String,
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingSection {
    /// Model for routing decisions; defaults to `llm.model`
    pub model: Option<String>,
    #[serde(default = "default_routing_temperature")]
    pub temperature: f32,
    #[serde(default = "default_routing_max_tokens")]
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_routing_temperature(),
            max_tokens: default_routing_max_tokens(),
            system_prompt: None,
        }
    }
}

fn default_routing_temperature() -> f32 {
    0.1
}

fn default_routing_max_tokens() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub system_prompt: Option<String>,
    /// Kinds served by the assistant; defaults to every non-payroll kind
    pub kinds: Option<Vec<TaskKind>>,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            enabled: true,
            system_prompt: None,
            kinds: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid service ID format: {0}")]
    InvalidServiceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid payroll rates: {0}")]
    Rates(#[from] RatesError),
}

impl DispatchConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_service_id(&self.service.id)?;

        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}', expected 'openai'",
                self.llm.provider
            )));
        }
        if let Some(temperature) = self.llm.temperature {
            validate_temperature("llm.temperature", temperature)?;
        }
        validate_temperature("routing.temperature", self.routing.temperature)?;
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "llm.timeout_secs must be positive".to_string(),
            ));
        }

        let activity = &self.service.activity_log;
        if activity.sink == ActivitySinkKind::JsonLines && activity.path.is_none() {
            return Err(ConfigError::InvalidConfig(
                "json_lines activity sink requires service.activity_log.path".to_string(),
            ));
        }
        if activity.capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "service.activity_log.capacity must be positive".to_string(),
            ));
        }

        if matches!(&self.assistant.kinds, Some(kinds) if kinds.is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "assistant.kinds must not be empty; disable the assistant instead".to_string(),
            ));
        }

        self.payroll.validate()?;
        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    pub fn routing_model(&self) -> &str {
        self.routing.model.as_deref().unwrap_or(&self.llm.model)
    }

    /// Provider settings, with the API key resolved from the environment
    pub fn openai_config(&self) -> Result<OpenAiConfig, ConfigError> {
        let defaults = OpenAiConfig::default();
        Ok(OpenAiConfig {
            api_key: self.get_llm_api_key()?,
            base_url: self.llm.base_url.clone().unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.service.host.parse().map_err(|_| {
            ConfigError::InvalidConfig(format!("Invalid service.host '{}'", self.service.host))
        })?;
        Ok(SocketAddr::new(ip, self.service.port))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[service]
id = "hr-dispatch-test"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate service ID format
pub fn validate_service_id(service_id: &str) -> Result<(), ConfigError> {
    let valid_chars = service_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if service_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidServiceId(format!(
            "Service ID '{service_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

fn validate_temperature(field: &str, temperature: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} must be between 0.0 and 2.0, got {temperature}"
        )));
    }
    Ok(())
}
