//! # delve
//!
//! Supervised multi-agent deep research. A single question goes through a
//! staged pipeline:
//!
//! 1. **Clarify**: a model decides whether the request is ambiguous and may
//!    ask the user one question before continuing.
//! 2. **Brief**: the conversation is condensed into a research brief.
//! 3. **Research**: a supervisor loop splits the brief into sub-topics and
//!    dispatches bounded researcher loops in parallel. Each researcher calls
//!    web search and reflection tools, then compresses what it found.
//! 4. **Report**: the aggregated notes are synthesized into a cited report.
//!
//! Every stage boundary is checkpointed, so a failed session resumes from the
//! stage that failed.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use delve::{DelveConfig, ResearchEngine, SubmitOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DelveConfig::load("delve.toml")?;
//!     let engine = ResearchEngine::from_config(&config)?;
//!
//!     match engine.submit("How do LFP and NMC cells compare on cost?").await? {
//!         SubmitOutcome::Report { report, .. } => println!("{}", report),
//!         SubmitOutcome::Clarification { question, .. } => println!("? {}", question),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`llm`] - Model clients (OpenAI-compatible, Ollama) and structured output
//! - [`tools`] - Tool registry, web search and reflection tools
//! - [`research`] - Clarification, brief, supervisor, researcher and report stages
//! - [`workflows`] - Session lifecycle and the research engine
//! - [`db`] - Session checkpoint storage
//! - [`types`] - Transcript, task and error types
//! - [`utils`] - TOML configuration

#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line parsing and terminal output.
pub mod cli;
/// Session checkpoint storage.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Research pipeline stages.
pub mod research;
/// Built-in tools (web search, think).
pub mod tools;
/// Core types (transcripts, tasks, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;
/// Session orchestration.
pub mod workflows;

pub use db::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use llm::{LLMClient, LLMResponse, ModelRoles, Provider};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::toml_config::DelveConfig;
pub use workflows::{ResearchEngine, Session, SubmitOutcome};
