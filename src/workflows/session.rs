use crate::types::{NoteSet, ResearchTask, Stage, StageError, TranscriptEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root aggregate of one research request, checkpointed at every stage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub conversation: Vec<TranscriptEntry>,
    pub research_brief: Option<String>,
    /// Aggregated notes and the raw-note log
    #[serde(default)]
    pub notes: NoteSet,
    /// Every research task dispatched, in dispatch order
    #[serde(default)]
    pub tasks: Vec<ResearchTask>,
    pub final_report: Option<String>,
    pub stage: Stage,
    /// Outstanding clarifying question while in `AwaitingUser`
    #[serde(default)]
    pub pending_question: Option<String>,
    /// Stage to restart from when `stage` is `Failed`
    #[serde(default)]
    pub failed_stage: Option<Stage>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            conversation: vec![TranscriptEntry::user(query)],
            research_brief: None,
            notes: NoteSet::new(),
            tasks: Vec::new(),
            final_report: None,
            stage: Stage::Clarifying,
            pending_question: None,
            failed_stage: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: &StageError) {
        self.failed_stage = Some(error.stage);
        self.error = Some(error.message.clone());
        self.enter(Stage::Failed);
    }

    /// Clear failure state and return the stage to restart from.
    pub fn restart_point(&mut self) -> Stage {
        let stage = self.failed_stage.take().unwrap_or(Stage::Clarifying);
        self.error = None;
        self.enter(stage);
        stage
    }

    /// The stored failure, if the session is in `Failed`.
    pub fn stage_error(&self) -> Option<StageError> {
        if self.stage != Stage::Failed {
            return None;
        }
        Some(StageError::new(
            self.failed_stage.unwrap_or(Stage::Clarifying),
            self.error.clone().unwrap_or_default(),
        ))
    }
}
