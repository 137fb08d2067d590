//! Single-topic researcher loop
//!
//! ```text
//! DECIDING --(tool calls, budget left)--> EXECUTING_TOOLS --> DECIDING
//! DECIDING --(no calls | research_complete | budget spent)--> COMPRESSING --> DONE
//! ```
//!
//! Tool failures are recorded and shown to the model on its next turn. A failed
//! model call ends the loop with an error; the supervisor turns that into a
//! failure note.

use crate::llm::client::LLMClient;
use crate::research::prompts;
use crate::tools::registry::{ToolContext, ToolRegistry};
use crate::types::{
    render_transcript, DecisionError, IterationBudget, ResearchArtifact, ToolCall,
    ToolCallRecord, ToolDefinition, TranscriptEntry,
};
use crate::utils::toml_config::ResearchConfig;
use crate::utils::truncate_chars;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the explicit stop tool offered to researchers and the supervisor.
pub const RESEARCH_COMPLETE: &str = "research_complete";

pub fn research_complete_tool() -> ToolDefinition {
    ToolDefinition {
        name: RESEARCH_COMPLETE.to_string(),
        description: "Signal that research is finished and the findings are sufficient."
            .to_string(),
        parameters: json!({ "type": "object", "properties": {} }),
    }
}

#[derive(Debug, Clone)]
pub struct ResearcherConfig {
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub compressed_max_chars: usize,
}

impl Default for ResearcherConfig {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for ResearcherConfig {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_iterations: config.max_react_tool_calls,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            compressed_max_chars: config.compressed_max_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearcherState {
    Deciding,
    ExecutingTools,
    Compressing,
    Done,
}

/// State after a model decision.
pub fn after_decision(
    has_tool_calls: bool,
    stop_signalled: bool,
    budget: &IterationBudget,
) -> ResearcherState {
    if has_tool_calls && !stop_signalled && !budget.exhausted() {
        ResearcherState::ExecutingTools
    } else {
        ResearcherState::Compressing
    }
}

/// Contents of every tool result in the transcript, in order.
pub fn extract_raw_notes(transcript: &[TranscriptEntry]) -> Vec<String> {
    transcript
        .iter()
        .filter_map(|entry| match entry {
            TranscriptEntry::ToolCallResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

/// Mutable context of one researcher run.
#[derive(Debug)]
struct ResearcherRun {
    topic: String,
    state: ResearcherState,
    budget: IterationBudget,
    transcript: Vec<TranscriptEntry>,
    records: Vec<ToolCallRecord>,
    pending: Vec<ToolCall>,
    artifact: Option<ResearchArtifact>,
}

/// Result of a finished researcher run.
#[derive(Debug, Clone)]
pub struct ResearcherOutcome {
    pub artifact: ResearchArtifact,
    pub iterations: usize,
    pub tool_calls: Vec<ToolCallRecord>,
}

pub struct ResearcherLoop {
    research: Arc<dyn LLMClient>,
    compression: Arc<dyn LLMClient>,
    tools: Arc<ToolRegistry>,
    config: ResearcherConfig,
}

impl ResearcherLoop {
    pub fn new(
        research: Arc<dyn LLMClient>,
        compression: Arc<dyn LLMClient>,
        tools: Arc<ToolRegistry>,
        config: ResearcherConfig,
    ) -> Self {
        Self {
            research,
            compression,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &ResearcherConfig {
        &self.config
    }

    /// Research one topic to completion.
    pub async fn run(&self, topic: &str) -> Result<ResearcherOutcome, DecisionError> {
        let ctx = ToolContext::new();
        let system =
            prompts::researcher_system(self.config.max_iterations, self.tools.has_tool("web_search"));
        let mut definitions = self.tools.get_tool_definitions();
        definitions.push(research_complete_tool());

        let mut run = ResearcherRun {
            topic: topic.to_string(),
            state: ResearcherState::Deciding,
            budget: IterationBudget::new(self.config.max_iterations),
            transcript: vec![TranscriptEntry::user(topic)],
            records: Vec::new(),
            pending: Vec::new(),
            artifact: None,
        };

        while run.state != ResearcherState::Done {
            match run.state {
                ResearcherState::Deciding => {
                    let response = self
                        .research
                        .generate_with_tools_and_history(&system, &run.transcript, &definitions)
                        .await?;
                    run.transcript.extend(response.to_transcript());

                    let stop_signalled = response
                        .tool_calls
                        .iter()
                        .any(|c| c.name == RESEARCH_COMPLETE);
                    run.state =
                        after_decision(response.has_tool_calls(), stop_signalled, &run.budget);
                    if run.state == ResearcherState::ExecutingTools {
                        run.pending = response.tool_calls;
                    }
                    debug!(topic = %run.topic, state = ?run.state, "Researcher decided");
                }
                ResearcherState::ExecutingTools => {
                    let calls = std::mem::take(&mut run.pending);
                    info!(
                        topic = %run.topic,
                        iteration = run.budget.current() + 1,
                        max = run.budget.max(),
                        calls = calls.len(),
                        "Researcher executing tools"
                    );
                    let records = join_all(
                        calls
                            .iter()
                            .map(|c| self.tools.execute_call(c, &ctx, self.config.tool_timeout)),
                    )
                    .await;
                    for record in records {
                        run.transcript.push(TranscriptEntry::result(&record));
                        run.records.push(record);
                    }
                    run.budget.advance();
                    run.state = ResearcherState::Deciding;
                }
                ResearcherState::Compressing => {
                    run.artifact = Some(self.compress(&run.topic, &run.transcript).await?);
                    run.state = ResearcherState::Done;
                }
                ResearcherState::Done => {}
            }
        }

        let artifact = run.artifact.ok_or_else(|| {
            DecisionError::InvalidOutput("researcher finished without an artifact".to_string())
        })?;
        info!(topic = %run.topic, iterations = run.budget.current(), "Researcher done");

        Ok(ResearcherOutcome {
            artifact,
            iterations: run.budget.current(),
            tool_calls: run.records,
        })
    }

    async fn compress(
        &self,
        topic: &str,
        transcript: &[TranscriptEntry],
    ) -> Result<ResearchArtifact, DecisionError> {
        let text = render_transcript(transcript);
        let summary = self
            .compression
            .generate_with_system(
                prompts::COMPRESS_SYSTEM,
                &prompts::compress_research(topic, &text),
            )
            .await?;

        let compressed = truncate_chars(summary.trim(), self.config.compressed_max_chars);
        if compressed.is_empty() {
            return Err(DecisionError::InvalidOutput(
                "compression produced no text".to_string(),
            ));
        }

        Ok(ResearchArtifact {
            compressed,
            raw_notes: extract_raw_notes(transcript),
        })
    }
}
