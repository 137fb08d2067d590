use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============= Tool Types =============

/// A tool advertised to the model for function calling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One executed tool call: the request paired with its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// Text handed back to the model. On failure this carries the error text.
    pub result: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallRecord {
    /// Record for a call that never produced output.
    pub fn failed(call: &ToolCall, error: impl Into<String>, duration_ms: u64) -> Self {
        let error = error.into();
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: format!("Error: {}", error),
            success: false,
            duration_ms,
            error: Some(error),
        }
    }
}

// ============= Transcript =============

/// One entry of an agent transcript.
///
/// The set is closed: every loop in the crate reads and writes only these four kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// Text supplied by the user (or by the orchestrator on the user's behalf).
    UserTurn { content: String },
    /// Free text emitted by the model.
    ModelDecision { content: String },
    /// A tool call emitted by the model. Always follows the decision that produced it.
    ToolCallRequest { call: ToolCall },
    /// Outcome of a previously requested tool call.
    ToolCallResult {
        call_id: String,
        name: String,
        success: bool,
        content: String,
    },
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        TranscriptEntry::UserTurn {
            content: content.into(),
        }
    }

    pub fn decision(content: impl Into<String>) -> Self {
        TranscriptEntry::ModelDecision {
            content: content.into(),
        }
    }

    pub fn request(call: ToolCall) -> Self {
        TranscriptEntry::ToolCallRequest { call }
    }

    pub fn result(record: &ToolCallRecord) -> Self {
        TranscriptEntry::ToolCallResult {
            call_id: record.id.clone(),
            name: record.name.clone(),
            success: record.success,
            content: record.result.clone(),
        }
    }

    /// Result entry built directly from a call, for results produced outside the tool registry.
    pub fn result_for(call: &ToolCall, success: bool, content: impl Into<String>) -> Self {
        TranscriptEntry::ToolCallResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success,
            content: content.into(),
        }
    }
}

/// Render a transcript as plain text, one block per entry.
pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        match entry {
            TranscriptEntry::UserTurn { content } => {
                out.push_str("User: ");
                out.push_str(content);
            }
            TranscriptEntry::ModelDecision { content } => {
                if content.trim().is_empty() {
                    continue;
                }
                out.push_str("Assistant: ");
                out.push_str(content);
            }
            TranscriptEntry::ToolCallRequest { call } => {
                out.push_str(&format!("Tool call {}({})", call.name, call.arguments));
            }
            TranscriptEntry::ToolCallResult {
                name,
                success,
                content,
                ..
            } => {
                let status = if *success { "ok" } else { "failed" };
                out.push_str(&format!("Tool result {} [{}]:\n{}", name, status, content));
            }
        }
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}

// ============= Research Types =============

/// One search hit. `url` is the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub raw_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Bounded output of a single researcher loop. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchArtifact {
    pub compressed: String,
    pub raw_notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// A sub-topic handed to one researcher loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTask {
    pub topic: String,
    pub status: TaskStatus,
    pub artifact: Option<ResearchArtifact>,
    pub iterations: usize,
    pub error: Option<String>,
}

impl ResearchTask {
    /// Create a pending task. Blank topics are rejected.
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "research topic must not be empty".to_string(),
            ));
        }
        Ok(Self {
            topic,
            status: TaskStatus::Pending,
            artifact: None,
            iterations: 0,
            error: None,
        })
    }

    /// Mark the task as handed to a researcher.
    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
    }

    pub fn succeed(&mut self, artifact: ResearchArtifact, iterations: usize) {
        self.status = TaskStatus::Succeeded;
        self.artifact = Some(artifact);
        self.iterations = iterations;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }
}

/// Iteration counter with a hard ceiling: `current` never passes `max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationBudget {
    current: usize,
    max: usize,
}

impl IterationBudget {
    pub fn new(max: usize) -> Self {
        Self { current: 0, max }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn exhausted(&self) -> bool {
        self.current >= self.max
    }

    /// Count one iteration. Saturates at `max`.
    pub fn advance(&mut self) {
        if self.current < self.max {
            self.current += 1;
        }
    }
}

/// Cap on researcher loops running at once in one supervisor round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcurrencyBudget(usize);

impl ConcurrencyBudget {
    /// A cap of zero is raised to one so a round can always make progress.
    pub fn new(cap: usize) -> Self {
        Self(cap.max(1))
    }

    pub fn cap(&self) -> usize {
        self.0
    }

    /// Split `items` into the first `cap` accepted and the dropped remainder.
    pub fn clip<T>(&self, mut items: Vec<T>) -> (Vec<T>, Vec<T>) {
        if items.len() <= self.0 {
            return (items, Vec::new());
        }
        let dropped = items.split_off(self.0);
        (items, dropped)
    }
}

/// Aggregated findings across supervisor rounds. Append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoteSet {
    notes: Vec<String>,
    raw_notes: Vec<String>,
}

impl NoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a successful artifact in: its raw notes plus a labeled compressed summary.
    pub fn push_success(&mut self, topic: &str, artifact: &ResearchArtifact) {
        self.raw_notes.extend(artifact.raw_notes.iter().cloned());
        self.notes.push(format!(
            "## Research findings: {}\n\n{}",
            topic, artifact.compressed
        ));
    }

    pub fn push_failure(&mut self, topic: &str, error: &str) {
        self.notes
            .push(format!("## Research failed: {}\n\nError: {}", topic, error));
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn raw_notes(&self) -> &[String] {
        &self.raw_notes
    }

    pub fn len(&self) -> usize {
        self.notes.len() + self.raw_notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.raw_notes.is_empty()
    }

    /// All labeled notes joined for the report prompt.
    pub fn joined(&self) -> String {
        self.notes.join("\n\n")
    }
}

// ============= Session Lifecycle =============

/// Lifecycle stage of a research session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clarifying,
    AwaitingUser,
    BriefReady,
    Researching,
    Reporting,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clarifying => "clarifying",
            Stage::AwaitingUser => "awaiting_user",
            Stage::BriefReady => "brief_ready",
            Stage::Researching => "researching",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

// ============= Error Types =============

/// Failure of a single tool call. Recorded in the transcript, never fatal.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Search provider error: {0}")]
    Provider(String),

    #[error("Tool '{tool}' timed out after {}ms", .limit.as_millis())]
    Timeout { tool: String, limit: std::time::Duration },
}

/// The model could not be reached or returned something unusable.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DecisionError {
    #[error("Model unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

/// A pipeline stage failed. Moves the session to `Failed`.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("Stage '{stage}' failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
