//! CLI module for delve
//!
//! Argument parsing uses clap derive; terminal output goes through
//! [`output::Output`], which falls back to plain text with `--no-color`.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// delve - supervised multi-agent deep research
#[derive(Parser, Debug)]
#[command(
    name = "delve",
    version,
    about = "delve - supervised multi-agent deep research",
    long_about = "Turns a research question into a cited report.\n\n\
                  A supervisor model plans sub-topics, dispatches parallel researcher\n\
                  loops that search the web, and a final model writes the report.\n\
                  Sessions are checkpointed so failed runs can be resumed.",
    after_help = "EXAMPLES:\n    \
                  delve init                          # Write delve.toml and .env.example\n    \
                  delve research \"state of EV batteries in 2025\"\n    \
                  delve reply <SESSION_ID> \"focus on Europe\"\n    \
                  delve resume <SESSION_ID>           # Retry a failed session\n    \
                  delve show <SESSION_ID>             # Inspect a checkpointed session"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "delve.toml", global = true)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a research session
    Research {
        /// The research question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Answer a clarifying question, or ask a follow-up on a finished session
    Reply {
        session_id: String,

        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Resume a failed session from the stage that failed
    Resume { session_id: String },

    /// Show a checkpointed session, or list sessions when no id is given
    Show { session_id: Option<String> },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Write a starter delve.toml and .env.example
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama or openai)
        #[arg(long, default_value = "ollama", value_parser = ["ollama", "openai"])]
        provider: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
