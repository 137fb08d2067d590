//! TOML-based configuration for delve
//!
//! Providers, models, role assignments, search settings and research budgets
//! are declared in a single TOML file (`delve.toml`). The research budgets can be
//! overridden from the environment:
//!
//! - `DELVE_MAX_RESEARCHER_ITERATIONS`
//! - `DELVE_MAX_REACT_TOOL_CALLS`
//! - `DELVE_MAX_CONCURRENT_RESEARCHERS`

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Root configuration structure loaded from delve.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelveConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    /// Which model serves which pipeline step
    #[serde(default)]
    pub roles: RolesConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

// ============= Logging =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token budget per call
    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_model_max_tokens() -> u32 {
    8192
}

// ============= Role Assignments =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_role_model")]
    pub research: String,
    #[serde(default = "default_role_model")]
    pub summarization: String,
    #[serde(default = "default_role_model")]
    pub compression: String,
    #[serde(default = "default_role_model")]
    pub final_report: String,
}

fn default_role_model() -> String {
    "default".to_string()
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            research: default_role_model(),
            summarization: default_role_model(),
            compression: default_role_model(),
            final_report: default_role_model(),
        }
    }
}

impl RolesConfig {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("research", self.research.as_str()),
            ("summarization", self.summarization.as_str()),
            ("compression", self.compression.as_str()),
            ("final_report", self.final_report.as_str()),
        ]
        .into_iter()
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Tavily,
    DuckDuckGo,
    /// No search tool; researchers can only reflect
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchBackend,

    /// Environment variable holding the Tavily API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Provider topic filter ("general", "news", "finance")
    #[serde(default = "default_search_topic")]
    pub topic: String,

    /// Raw page content is cut to this many characters
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Summarize each page with the summarization model
    #[serde(default = "default_true")]
    pub summarize: bool,

    #[serde(default = "default_summarization_timeout")]
    pub summarization_timeout_secs: u64,
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_topic() -> String {
    "general".to_string()
}

fn default_max_content_length() -> usize {
    50_000
}

fn default_true() -> bool {
    true
}

fn default_summarization_timeout() -> u64 {
    60
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchBackend::default(),
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
            topic: default_search_topic(),
            max_content_length: default_max_content_length(),
            summarize: true,
            summarization_timeout_secs: default_summarization_timeout(),
        }
    }
}

// ============= Research Budgets =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    /// Ask a clarifying question when the request is ambiguous
    #[serde(default = "default_true")]
    pub allow_clarification: bool,

    /// Supervisor rounds before research is forced to stop
    #[serde(default = "default_researcher_iterations")]
    pub max_researcher_iterations: usize,

    /// Tool-execution turns per researcher loop
    #[serde(default = "default_react_tool_calls")]
    pub max_react_tool_calls: usize,

    /// Researcher loops running at once per supervisor round
    #[serde(default = "default_concurrent_units")]
    pub max_concurrent_research_units: usize,

    /// Hard character cap on a compressed research artifact
    #[serde(default = "default_compressed_max_chars")]
    pub compressed_max_chars: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_researcher_iterations() -> usize {
    6
}

fn default_react_tool_calls() -> usize {
    5
}

fn default_concurrent_units() -> usize {
    5
}

fn default_compressed_max_chars() -> usize {
    20_000
}

fn default_tool_timeout() -> u64 {
    120
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            allow_clarification: true,
            max_researcher_iterations: default_researcher_iterations(),
            max_react_tool_calls: default_react_tool_calls(),
            max_concurrent_research_units: default_concurrent_units(),
            compressed_max_chars: default_compressed_max_chars(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

// ============= Checkpoint Storage =============

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,

    /// Directory for file checkpoints, one JSON file per session
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            dir: default_checkpoint_dir(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    UnusedProvider,
    UnusedModel,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by role '{1}' does not exist")]
    MissingModel(String, String),

    #[error("Invalid value for {0}: {1}")]
    InvalidOverride(String, String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(e: ConfigError) -> Self {
        crate::types::AppError::Configuration(e.to_string())
    }
}

const ENV_RESEARCHER_ITERATIONS: &str = "DELVE_MAX_RESEARCHER_ITERATIONS";
const ENV_REACT_TOOL_CALLS: &str = "DELVE_MAX_REACT_TOOL_CALLS";
const ENV_CONCURRENT_RESEARCHERS: &str = "DELVE_MAX_CONCURRENT_RESEARCHERS";

impl DelveConfig {
    /// Load, apply environment overrides and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse TOML text and apply environment overrides, without validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: DelveConfig = toml::from_str(content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay budget knobs from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_usize(ENV_RESEARCHER_ITERATIONS)? {
            self.research.max_researcher_iterations = v;
        }
        if let Some(v) = env_usize(ENV_REACT_TOOL_CALLS)? {
            self.research.max_react_tool_calls = v;
        }
        if let Some(v) = env_usize(ENV_CONCURRENT_RESEARCHERS)? {
            self.research.max_concurrent_research_units = v;
        }
        Ok(())
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in self.providers.values() {
            if let ProviderConfig::OpenAI { api_key_env, .. } = provider {
                self.validate_env_var(api_key_env)?;
            }
        }

        for (name, model) in &self.models {
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::MissingProvider(
                    model.provider.clone(),
                    name.clone(),
                ));
            }
        }

        for (role, model) in self.roles.iter() {
            if !self.models.contains_key(model) {
                return Err(ConfigError::MissingModel(model.to_string(), role.to_string()));
            }
        }

        if self.search.provider == SearchBackend::Tavily {
            self.validate_env_var(&self.search.api_key_env)?;
        }

        let positive = [
            ("search.max_results", self.search.max_results),
            ("search.max_content_length", self.search.max_content_length),
            (
                "research.max_researcher_iterations",
                self.research.max_researcher_iterations,
            ),
            (
                "research.max_react_tool_calls",
                self.research.max_react_tool_calls,
            ),
            (
                "research.max_concurrent_research_units",
                self.research.max_concurrent_research_units,
            ),
            (
                "research.compressed_max_chars",
                self.research.compressed_max_chars,
            ),
            (
                "research.tool_timeout_secs",
                self.research.tool_timeout_secs as usize,
            ),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be at least 1",
                    key
                )));
            }
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Validate configuration with warnings for unused items
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();

        let used_providers: HashSet<_> =
            self.models.values().map(|m| m.provider.as_str()).collect();
        for name in self.providers.keys() {
            if !used_providers.contains(name.as_str()) {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::UnusedProvider,
                    message: format!(
                        "Provider '{}' is defined but not referenced by any model",
                        name
                    ),
                });
            }
        }

        let used_models: HashSet<_> = self.roles.iter().map(|(_, m)| m).collect();
        for name in self.models.keys() {
            if !used_models.contains(name.as_str()) {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::UnusedModel,
                    message: format!("Model '{}' is defined but not assigned to any role", name),
                });
            }
        }

        for w in &warnings {
            warn!("{}", w);
        }

        Ok(warnings)
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    /// Resolve the search API key, if the configured backend needs one.
    pub fn search_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.search.api_key_env)
            .map_err(|_| ConfigError::MissingEnvVar(self.search.api_key_env.clone()))
    }
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride(name.to_string(), raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[providers.local]
type = "ollama"
default_model = "qwen3:8b"

[models.default]
provider = "local"
model = "qwen3:8b"

[search]
provider = "duckduckgo"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config: DelveConfig = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.roles.final_report, "default");
        assert_eq!(config.search.max_results, 5);
        assert!(config.research.allow_clarification);
        assert_eq!(config.research.max_concurrent_research_units, 5);
        assert_eq!(config.checkpoint.dir, PathBuf::from("sessions"));

        match config.get_provider("local").unwrap() {
            ProviderConfig::Ollama { base_url, .. } => {
                assert_eq!(base_url, "http://localhost:11434")
            }
            _ => panic!("expected ollama provider"),
        }
    }

    #[test]
    fn test_missing_provider_reference() {
        let config: DelveConfig = toml::from_str(
            r#"
[models.default]
provider = "ghost"
model = "x"

[search]
provider = "none"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProvider(p, m)) if p == "ghost" && m == "default"
        ));
    }

    #[test]
    fn test_missing_role_model() {
        let mut config: DelveConfig = toml::from_str(MINIMAL).unwrap();
        config.roles.compression = "big".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingModel(m, r)) if m == "big" && r == "compression"
        ));
    }

    #[test]
    fn test_tavily_requires_key() {
        let mut config: DelveConfig = toml::from_str(MINIMAL).unwrap();
        config.search.provider = SearchBackend::Tavily;
        config.search.api_key_env = "DELVE_TEST_TAVILY_KEY_UNSET".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(v)) if v == "DELVE_TEST_TAVILY_KEY_UNSET"
        ));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut config: DelveConfig = toml::from_str(MINIMAL).unwrap();
        config.research.max_concurrent_research_units = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_research_units"));
    }

    #[test]
    fn test_unused_items_warn() {
        let mut config: DelveConfig = toml::from_str(MINIMAL).unwrap();
        config.models.insert(
            "spare".to_string(),
            ModelConfig {
                provider: "local".to_string(),
                model: "llama3.2".to_string(),
                temperature: 0.0,
                max_tokens: 1024,
            },
        );
        let warnings = config.validate_with_warnings().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, ConfigWarningKind::UnusedModel);
    }

    #[test]
    fn test_parse_rejects_unknown_provider_type() {
        let result = DelveConfig::parse(
            r#"
[providers.x]
type = "carrier-pigeon"
default_model = "coo"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
