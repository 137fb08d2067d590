//! Research Engine
//!
//! Sequences the research pipeline for one session:
//!
//! ```text
//! CLARIFYING -> AWAITING_USER
//! CLARIFYING -> BRIEF_READY -> RESEARCHING -> REPORTING -> DONE
//! any stage  -> FAILED (resumable from the failed stage)
//! ```
//!
//! The session is checkpointed after every transition. Stages are not retried;
//! a failed stage leaves the session in `Failed` with the error and the stage
//! to restart from.

use crate::db::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::llm::client::ModelRoles;
use crate::research::brief::BriefBuilder;
use crate::research::report::ReportSynthesizer;
use crate::research::researcher::{ResearcherConfig, ResearcherLoop};
use crate::research::supervisor::{Supervisor, SupervisorConfig};
use crate::tools::registry::ToolRegistry;
use crate::tools::search::{
    DuckDuckGoSearchProvider, SearchProvider, SearchTool, TavilySearchProvider, WebpageSummarizer,
};
use crate::tools::research_registry;
use crate::types::{AppError, Result, Stage, StageError, TranscriptEntry};
use crate::utils::toml_config::{CheckpointBackend, DelveConfig, ResearchConfig, SearchBackend};
use crate::workflows::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// What a caller gets back from a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Research finished with a report
    Report { session_id: String, report: String },
    /// The request was ambiguous; answer with [`ResearchEngine::reply`]
    Clarification { session_id: String, question: String },
}

impl SubmitOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            SubmitOutcome::Report { session_id, .. } => session_id,
            SubmitOutcome::Clarification { session_id, .. } => session_id,
        }
    }
}

/// Top-level orchestrator owning the session lifecycle.
pub struct ResearchEngine {
    brief: BriefBuilder,
    supervisor: Supervisor,
    report: ReportSynthesizer,
    store: Arc<dyn CheckpointStore>,
    allow_clarification: bool,
}

impl ResearchEngine {
    pub fn new(
        roles: ModelRoles,
        tools: Arc<ToolRegistry>,
        config: &ResearchConfig,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let researcher = Arc::new(ResearcherLoop::new(
            roles.research.clone(),
            roles.compression.clone(),
            tools.clone(),
            ResearcherConfig::from(config),
        ));
        Self {
            brief: BriefBuilder::new(roles.research.clone()),
            supervisor: Supervisor::new(
                roles.research.clone(),
                researcher,
                tools,
                SupervisorConfig::from(config),
            ),
            report: ReportSynthesizer::new(roles.final_report),
            store,
            allow_clarification: config.allow_clarification,
        }
    }

    /// Wire models, search, tools and checkpoint storage from configuration.
    pub fn from_config(config: &DelveConfig) -> Result<Self> {
        let roles = ModelRoles::from_config(config)?;

        let provider: Option<Arc<dyn SearchProvider>> = match config.search.provider {
            SearchBackend::Tavily => Some(Arc::new(TavilySearchProvider::new(
                config.search_api_key()?,
            ))),
            SearchBackend::DuckDuckGo => Some(Arc::new(DuckDuckGoSearchProvider)),
            SearchBackend::None => None,
        };

        let search = provider.map(|provider| {
            let summarizer = config.search.summarize.then(|| {
                WebpageSummarizer::new(
                    roles.summarization.clone(),
                    Duration::from_secs(config.search.summarization_timeout_secs),
                )
            });
            SearchTool::new(provider, summarizer, config.search.clone())
        });

        let tools = Arc::new(research_registry(search));

        let store: Arc<dyn CheckpointStore> = match config.checkpoint.backend {
            CheckpointBackend::File => Arc::new(FileCheckpointStore::new(&config.checkpoint.dir)),
            CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
        };

        Ok(Self::new(roles, tools, &config.research, store))
    }

    /// Start a new session from a single user query.
    pub async fn submit(&self, query: &str) -> Result<SubmitOutcome> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }
        let session = Session::new(query.trim());
        info!(session_id = %session.id, "Session created");
        self.store.put(&session).await?;
        self.drive(session).await
    }

    /// Add a user turn to a session waiting on clarification (or finished) and run again.
    pub async fn reply(&self, session_id: &str, message: &str) -> Result<SubmitOutcome> {
        if message.trim().is_empty() {
            return Err(AppError::InvalidInput("reply must not be empty".to_string()));
        }
        let mut session = self.session(session_id).await?;
        if !matches!(session.stage, Stage::AwaitingUser | Stage::Done) {
            return Err(AppError::InvalidInput(format!(
                "session {} is in stage '{}' and cannot take a reply",
                session_id, session.stage
            )));
        }

        session.conversation.push(TranscriptEntry::user(message.trim()));
        session.pending_question = None;
        session.research_brief = None;
        session.final_report = None;
        session.enter(Stage::Clarifying);
        self.store.put(&session).await?;
        self.drive(session).await
    }

    /// Continue a session from where it stopped.
    ///
    /// A failed session restarts at its failed stage and keeps everything earlier
    /// stages produced. Finished and waiting sessions return their current outcome.
    pub async fn resume(&self, session_id: &str) -> Result<SubmitOutcome> {
        let mut session = self.session(session_id).await?;
        if session.stage == Stage::Failed {
            let stage = session.restart_point();
            info!(session_id = %session.id, %stage, "Resuming failed session");
            self.store.put(&session).await?;
        }
        self.drive(session).await
    }

    /// Load a checkpointed session.
    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    async fn drive(&self, mut session: Session) -> Result<SubmitOutcome> {
        loop {
            let stage = session.stage;
            match stage {
                Stage::Clarifying => match self.clarify(&mut session).await {
                    Ok(Some(question)) => {
                        session.pending_question = Some(question);
                        session.enter(Stage::AwaitingUser);
                    }
                    Ok(None) => session.enter(Stage::BriefReady),
                    Err(message) => return self.fail(session, Stage::Clarifying, message).await,
                },
                Stage::BriefReady => session.enter(Stage::Researching),
                Stage::Researching => {
                    let Some(brief) = session.research_brief.clone() else {
                        return self
                            .fail(session, Stage::Researching, "no research brief".to_string())
                            .await;
                    };
                    match self.supervisor.run(&brief).await {
                        Ok(outcome) => {
                            info!(
                                session_id = %session.id,
                                rounds = outcome.rounds,
                                tasks = outcome.tasks.len(),
                                notes = outcome.notes.notes().len(),
                                "Research stage complete"
                            );
                            session.notes = outcome.notes;
                            session.tasks = outcome.tasks;
                            session.enter(Stage::Reporting);
                        }
                        Err(e) => return self.fail(session, Stage::Researching, e.to_string()).await,
                    }
                }
                Stage::Reporting => {
                    let brief = session.research_brief.clone().unwrap_or_default();
                    match self.report.synthesize(&brief, &session.notes).await {
                        Ok(report) => {
                            session.final_report = Some(report);
                            session.enter(Stage::Done);
                        }
                        Err(e) => return self.fail(session, Stage::Reporting, e.to_string()).await,
                    }
                }
                Stage::Done => {
                    let report = session.final_report.clone().ok_or_else(|| {
                        AppError::Internal(format!("session {} is done without a report", session.id))
                    })?;
                    return Ok(SubmitOutcome::Report {
                        session_id: session.id,
                        report,
                    });
                }
                Stage::AwaitingUser => {
                    return Ok(SubmitOutcome::Clarification {
                        question: session.pending_question.clone().unwrap_or_default(),
                        session_id: session.id,
                    });
                }
                Stage::Failed => {
                    let error = session
                        .stage_error()
                        .unwrap_or_else(|| StageError::new(Stage::Failed, "unknown failure"));
                    return Err(error.into());
                }
            }

            info!(session_id = %session.id, stage = %session.stage, "Stage transition");
            self.store.put(&session).await?;
        }
    }

    /// Decide on clarification; when none is needed, produce the brief.
    ///
    /// Returns the question to ask, or `None` once the brief is set.
    async fn clarify(&self, session: &mut Session) -> std::result::Result<Option<String>, String> {
        if self.allow_clarification {
            let decision = self
                .brief
                .decide_clarification(&session.conversation)
                .await
                .map_err(|e| e.to_string())?;

            if decision.need_clarification {
                let question = decision.question.trim().to_string();
                session
                    .conversation
                    .push(TranscriptEntry::decision(question.clone()));
                return Ok(Some(question));
            }

            if !decision.verification.trim().is_empty() {
                session
                    .conversation
                    .push(TranscriptEntry::decision(decision.verification.trim()));
            }
        }

        let brief = self
            .brief
            .build_brief(&session.conversation)
            .await
            .map_err(|e| e.to_string())?;
        session.research_brief = Some(brief);
        Ok(None)
    }

    async fn fail(&self, mut session: Session, stage: Stage, message: String) -> Result<SubmitOutcome> {
        let err = StageError::new(stage, message);
        error!(session_id = %session.id, %stage, error = %err.message, "Stage failed");
        session.fail(&err);
        if let Err(e) = self.store.put(&session).await {
            error!(session_id = %session.id, error = %e, "Failed to checkpoint failed session");
        }
        Err(err.into())
    }
}
