//! `delve init`: scaffold a `delve.toml` and `.env.example` in a directory.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    Success,
    /// `delve.toml` exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

/// Options for the init command
pub struct InitConfig {
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure: `ollama` or `openai`
    pub provider: String,
}

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing delve");

    let base = &config.path;
    let config_path = base.join("delve.toml");
    if config_path.exists() && !config.force {
        output.warning("delve.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = fs::create_dir_all(base) {
        output.error(&format!("Failed to create {}: {}", base.display(), e));
        return InitResult::Error(e.to_string());
    }

    let files = [
        ("config", "delve.toml", generate_delve_toml(&config.provider)),
        ("env", ".env.example", generate_env_example(&config.provider)),
    ];
    for (kind, name, content) in &files {
        match write_file(&base.join(name), content, config.force) {
            Ok(true) => output.created(kind, name),
            Ok(false) => output.skipped(name, "already exists"),
            Err(e) => {
                output.error(&format!("Failed to create {}: {}", name, e));
                return InitResult::Error(e.to_string());
            }
        }
    }

    output.complete("delve initialized");
    output.header("Next Steps");
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    if config.provider == "ollama" {
        output.info("2. Pull the model:");
        output.command("ollama pull qwen3:8b");
    } else {
        output.info("2. Set OPENAI_API_KEY in .env");
    }
    output.info("3. Run a query:");
    output.command("delve research \"How do solid-state batteries compare to LFP?\"");

    InitResult::Success
}

/// Returns whether the file was written.
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

fn generate_delve_toml(provider: &str) -> String {
    let (provider_section, model) = if provider == "openai" {
        (
            r#"[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
default_model = "gpt-4.1"
"#,
            "gpt-4.1",
        )
    } else {
        (
            r#"[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "qwen3:8b"
"#,
            "qwen3:8b",
        )
    };
    let provider_name = if provider == "openai" { "openai" } else { "ollama" };

    format!(
        r#"# delve configuration

[logging]
level = "info"
format = "pretty"

{provider_section}
[models.default]
provider = "{provider_name}"
model = "{model}"
temperature = 0.0
max_tokens = 8192

# Each pipeline role can point at a different [models.*] entry.
[roles]
research = "default"
summarization = "default"
compression = "default"
final_report = "default"

[search]
# tavily | duckduckgo | none
provider = "duckduckgo"
api_key_env = "TAVILY_API_KEY"
max_results = 5
summarize = true

[research]
allow_clarification = true
max_researcher_iterations = 6
max_react_tool_calls = 5
max_concurrent_research_units = 5

[checkpoint]
backend = "file"
dir = "sessions"
"#
    )
}

fn generate_env_example(provider: &str) -> String {
    let mut content = String::from(
        r#"# delve environment variables
# Copy this file to .env and fill in the values.

RUST_LOG=info,delve=debug

# Only needed with [search] provider = "tavily"
# TAVILY_API_KEY=tvly-...

# Budget overrides
# DELVE_MAX_RESEARCHER_ITERATIONS=6
# DELVE_MAX_REACT_TOOL_CALLS=5
# DELVE_MAX_CONCURRENT_RESEARCHERS=5
"#,
    );
    if provider == "openai" {
        content.push_str("\nOPENAI_API_KEY=sk-...\n");
    }
    content
}
