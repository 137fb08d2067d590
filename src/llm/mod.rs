//! LLM Provider Clients and Abstractions
//!
//! All model calls made by the research pipeline go through the [`LLMClient`]
//! trait. Loops receive clients as `Arc<dyn LLMClient>` through [`ModelRoles`],
//! so tests can substitute scripted clients and deployments can mix providers
//! per role.
//!
//! # Providers
//!
//! - [`openai::OpenAIClient`] - OpenAI-compatible chat completions via `async-openai`
//! - [`ollama::OllamaClient`] - local Ollama server via `ollama-rs`
//!
//! # Structured output
//!
//! [`structured::generate_typed`] derives a JSON schema with `schemars` and
//! deserializes the reply into the requested type.
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::{ModelRoles, Provider};
//!
//! let config = DelveConfig::load("delve.toml")?;
//! let roles = ModelRoles::from_config(&config)?;
//! let text = roles.research.generate_with_system("Be terse.", "What is 2+2?").await?;
//! ```

/// Core LLM client trait, provider selection and role wiring.
pub mod client;
/// Ollama `/api/chat` client.
pub mod ollama;
/// OpenAI-compatible `/chat/completions` client.
pub mod openai;
/// Schema-constrained typed generation.
pub mod structured;

pub use client::{GenerationOptions, LLMClient, LLMResponse, ModelRoles, Provider};
pub use structured::generate_typed;
