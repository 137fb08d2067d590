//! Supervised Multi-Agent Research
//!
//! The pieces the orchestrator sequences into one research run:
//!
//! - [`brief::BriefBuilder`] - clarification decision and research brief
//! - [`supervisor::Supervisor`] - plans sub-topics and fans out researchers
//! - [`researcher::ResearcherLoop`] - single-topic tool loop with compression
//! - [`report::ReportSynthesizer`] - final report from the aggregated notes
//!
//! # Budgets
//!
//! Two nested iteration budgets bound the work: `max_researcher_iterations`
//! caps supervisor rounds (each round delegates a batch of researchers) and
//! `max_react_tool_calls` caps tool turns per researcher. Per round, at most
//! `max_concurrent_research_units` researchers run at once.
//!
//! # Usage
//!
//! ```ignore
//! let researcher = Arc::new(ResearcherLoop::new(
//!     roles.research.clone(),
//!     roles.compression.clone(),
//!     tools.clone(),
//!     ResearcherConfig::from(&config.research),
//! ));
//! let supervisor = Supervisor::new(roles.research.clone(), researcher, tools, (&config.research).into());
//! let outcome = supervisor.run("Compare LFP and NMC cell costs in 2024").await?;
//! println!("{} notes", outcome.notes.notes().len());
//! ```

/// Clarification and research brief.
pub mod brief;
/// Prompt templates.
pub mod prompts;
/// Final report synthesis.
pub mod report;
/// Single-topic researcher loop.
pub mod researcher;
/// Supervisor loop and fan-out.
pub mod supervisor;

pub use brief::{BriefBuilder, ClarificationDecision, ResearchQuestion};
pub use report::ReportSynthesizer;
pub use researcher::{ResearcherConfig, ResearcherLoop, ResearcherOutcome, RESEARCH_COMPLETE};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorOutcome, CONDUCT_RESEARCH};
