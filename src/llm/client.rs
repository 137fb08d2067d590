//! LLM client abstraction and provider selection
//!
//! Every model decision in the pipeline goes through [`LLMClient`]. Two
//! providers ship with the crate:
//! - **OpenAI**: any OpenAI-compatible endpoint via `async-openai`
//! - **Ollama**: local inference via `ollama-rs`

use crate::types::{DecisionError, Result, ToolCall, ToolDefinition, TranscriptEntry};
use crate::utils::toml_config::{DelveConfig, ProviderConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction
///
/// Failures are reported as [`DecisionError`]: `Unreachable` when the call did not
/// complete, `InvalidOutput` when the reply could not be interpreted.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Free-text completion with a system prompt
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> std::result::Result<String, DecisionError>;

    /// Tool-calling decision over an agent transcript
    async fn generate_with_tools_and_history(
        &self,
        system: &str,
        history: &[TranscriptEntry],
        tools: &[ToolDefinition],
    ) -> std::result::Result<LLMResponse, DecisionError>;

    /// Completion constrained to a JSON schema. Returns the parsed JSON value.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> std::result::Result<Value, DecisionError>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from a tool-calling generation request
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Transcript entries for this decision: the text, then one request per tool call.
    pub fn to_transcript(&self) -> Vec<TranscriptEntry> {
        let mut entries = Vec::with_capacity(self.tool_calls.len() + 1);
        entries.push(TranscriptEntry::decision(self.content.clone()));
        entries.extend(self.tool_calls.iter().cloned().map(TranscriptEntry::request));
        entries
    }
}

/// Generation parameters shared by both providers
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API or any compatible endpoint (OpenRouter, vLLM, Azure)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        options: GenerationOptions,
    },

    /// Ollama local LLM provider
    Ollama {
        base_url: String,
        model: String,
        options: GenerationOptions,
    },
}

impl Provider {
    /// Resolve a named `[models.*]` entry into a provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the model or its provider is not defined,
    /// or if the provider's API key variable is unset.
    pub fn from_config(config: &DelveConfig, model_name: &str) -> Result<Self> {
        let model = config.get_model(model_name).ok_or_else(|| {
            crate::types::AppError::Configuration(format!("Model '{}' not defined", model_name))
        })?;
        let provider = config.get_provider(&model.provider).ok_or_else(|| {
            crate::types::AppError::Configuration(format!(
                "Provider '{}' not defined (referenced by model '{}')",
                model.provider, model_name
            ))
        })?;

        let options = GenerationOptions {
            temperature: model.temperature,
            max_tokens: model.max_tokens,
        };

        match provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                ..
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    crate::types::AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.model.clone(),
                    options,
                })
            }
            ProviderConfig::Ollama { base_url, .. } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.model.clone(),
                options,
            }),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the Ollama base URL does not parse.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        let client: Arc<dyn LLMClient> = match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                options,
            } => Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                options.clone(),
            )),
            Provider::Ollama {
                base_url,
                model,
                options,
            } => Arc::new(super::ollama::OllamaClient::new(
                base_url.clone(),
                model.clone(),
                options.clone(),
            )?),
        };
        Ok(client)
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }
}

/// The model serving each pipeline role.
///
/// Roles may share a client; each is an independent `Arc` handle.
#[derive(Clone)]
pub struct ModelRoles {
    /// Clarification, brief, supervisor and researcher decisions
    pub research: Arc<dyn LLMClient>,
    /// Per-webpage summaries inside the search tool
    pub summarization: Arc<dyn LLMClient>,
    /// Researcher transcript compression
    pub compression: Arc<dyn LLMClient>,
    /// Final report synthesis
    pub final_report: Arc<dyn LLMClient>,
}

impl ModelRoles {
    /// Use one client for every role.
    pub fn uniform(client: Arc<dyn LLMClient>) -> Self {
        Self {
            research: client.clone(),
            summarization: client.clone(),
            compression: client.clone(),
            final_report: client,
        }
    }

    /// Build role clients from the `[roles]` section.
    pub fn from_config(config: &DelveConfig) -> Result<Self> {
        let roles = &config.roles;
        Ok(Self {
            research: Provider::from_config(config, &roles.research)?.create_client()?,
            summarization: Provider::from_config(config, &roles.summarization)?.create_client()?,
            compression: Provider::from_config(config, &roles.compression)?.create_client()?,
            final_report: Provider::from_config(config, &roles.final_report)?.create_client()?,
        })
    }
}
