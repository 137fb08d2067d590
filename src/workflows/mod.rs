//! Research Pipeline Orchestration
//!
//! [`ResearchEngine`] owns each [`Session`] from the first query to the final
//! report, checkpointing after every stage so failed runs can be resumed.
//!
//! # Configuration
//!
//! ```toml
//! [research]
//! allow_clarification = true
//! max_researcher_iterations = 6
//! max_react_tool_calls = 5
//! max_concurrent_research_units = 5
//!
//! [checkpoint]
//! backend = "file"
//! dir = "sessions"
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = ResearchEngine::from_config(&config)?;
//! match engine.submit("Compare LFP and NMC battery costs").await? {
//!     SubmitOutcome::Report { report, .. } => println!("{}", report),
//!     SubmitOutcome::Clarification { session_id, question } => {
//!         let answer = ask_user(&question);
//!         engine.reply(&session_id, &answer).await?;
//!     }
//! }
//! ```

pub mod engine;
pub mod session;

pub use engine::{ResearchEngine, SubmitOutcome};
pub use session::Session;
