//! Supervisor loop: plans sub-topics, fans out researcher loops, folds results.
//!
//! ```text
//! PLANNING --(conduct_research calls)--> DISPATCHING --> PLANNING
//! PLANNING --(research_complete | no calls | rounds spent)--> TERMINATING --> DONE
//! ```
//!
//! At most `max_concurrent` topics are accepted per round; the rest are
//! dropped for that round and the model is told so. Accepted topics run on a
//! `JoinSet` gated by a semaphore of the same size, and the round waits for
//! all of them before the next plan.

use crate::llm::client::LLMClient;
use crate::research::prompts;
use crate::research::researcher::{
    research_complete_tool, ResearcherLoop, ResearcherOutcome, RESEARCH_COMPLETE,
};
use crate::tools::registry::{ToolContext, ToolRegistry};
use crate::types::{
    ConcurrencyBudget, DecisionError, IterationBudget, NoteSet, ResearchTask, TaskStatus,
    ToolCall, ToolDefinition, TranscriptEntry,
};
use crate::utils::toml_config::ResearchConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub const CONDUCT_RESEARCH: &str = "conduct_research";

pub fn conduct_research_tool() -> ToolDefinition {
    ToolDefinition {
        name: CONDUCT_RESEARCH.to_string(),
        description: "Delegate one research sub-topic to a dedicated researcher.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "research_topic": {
                    "type": "string",
                    "description": "The topic to research, described in full detail"
                }
            },
            "required": ["research_topic"]
        }),
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub max_iterations: usize,
    pub max_concurrent: usize,
    pub tool_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for SupervisorConfig {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_iterations: config.max_researcher_iterations,
            max_concurrent: config.max_concurrent_research_units,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Planning,
    Dispatching,
    Terminating,
    Done,
}

/// What the supervisor produced: the note set plus every task it ran.
#[derive(Debug, Clone)]
pub struct SupervisorOutcome {
    pub notes: NoteSet,
    pub tasks: Vec<ResearchTask>,
    pub rounds: usize,
}

/// A model plan split by tool.
#[derive(Debug, Default)]
struct Plan {
    topics: Vec<(ToolCall, ResearchTask)>,
    reflections: Vec<ToolCall>,
    rejected: Vec<(ToolCall, String)>,
    complete: bool,
    empty: bool,
}

fn topic_of(args: &Value) -> Option<&str> {
    args.get("research_topic").and_then(Value::as_str)
}

fn classify(calls: Vec<ToolCall>) -> Plan {
    let mut plan = Plan {
        empty: calls.is_empty(),
        ..Default::default()
    };
    for call in calls {
        match call.name.as_str() {
            CONDUCT_RESEARCH => match ResearchTask::new(topic_of(&call.arguments).unwrap_or("")) {
                Ok(task) => plan.topics.push((call, task)),
                Err(e) => plan.rejected.push((call, e.to_string())),
            },
            "think" => plan.reflections.push(call),
            RESEARCH_COMPLETE => plan.complete = true,
            other => {
                let reason = format!("Tool not found: {}", other);
                plan.rejected.push((call, reason));
            }
        }
    }
    plan
}

fn start_round(round: &mut [(ToolCall, ResearchTask)]) {
    for (_, task) in round.iter_mut() {
        task.start();
    }
}

pub struct Supervisor {
    client: Arc<dyn LLMClient>,
    researcher: Arc<ResearcherLoop>,
    tools: Arc<ToolRegistry>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        client: Arc<dyn LLMClient>,
        researcher: Arc<ResearcherLoop>,
        tools: Arc<ToolRegistry>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            client,
            researcher,
            tools,
            config,
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = vec![conduct_research_tool(), research_complete_tool()];
        defs.extend(
            self.tools
                .get_tool_definitions()
                .into_iter()
                .filter(|d| d.name == "think"),
        );
        defs
    }

    /// Run supervised research for a brief until completion or budget exhaustion.
    pub async fn run(&self, brief: &str) -> Result<SupervisorOutcome, DecisionError> {
        let system = prompts::supervisor_system(self.config.max_concurrent, self.config.max_iterations);
        let definitions = self.definitions();
        let concurrency = ConcurrencyBudget::new(self.config.max_concurrent);
        let ctx = ToolContext::new();

        let mut state = SupervisorState::Planning;
        let mut budget = IterationBudget::new(self.config.max_iterations);
        let mut transcript = vec![TranscriptEntry::user(prompts::supervisor_kickoff(brief))];
        let mut notes = NoteSet::new();
        let mut tasks: Vec<ResearchTask> = Vec::new();
        let mut accepted: Vec<(ToolCall, ResearchTask)> = Vec::new();

        while state != SupervisorState::Done {
            match state {
                SupervisorState::Planning => {
                    let response = self
                        .client
                        .generate_with_tools_and_history(&system, &transcript, &definitions)
                        .await?;
                    transcript.extend(response.to_transcript());

                    let plan = classify(response.tool_calls);
                    if plan.complete || plan.empty || budget.exhausted() {
                        info!(
                            round = budget.current(),
                            complete = plan.complete,
                            exhausted = budget.exhausted(),
                            "Supervisor terminating"
                        );
                        state = SupervisorState::Terminating;
                        continue;
                    }

                    for (call, reason) in &plan.rejected {
                        transcript.push(TranscriptEntry::result_for(
                            call,
                            false,
                            format!("Error: {}", reason),
                        ));
                    }

                    for call in &plan.reflections {
                        let record = self
                            .tools
                            .execute_call(call, &ctx, self.config.tool_timeout)
                            .await;
                        transcript.push(TranscriptEntry::result(&record));
                    }

                    let (kept, dropped) = concurrency.clip(plan.topics);
                    for (call, task) in &dropped {
                        warn!(topic = %task.topic, "Research topic dropped by concurrency limit");
                        transcript.push(TranscriptEntry::result_for(
                            call,
                            false,
                            format!(
                                "Not dispatched: at most {} research units run per round. Delegate it again later if it is still needed.",
                                concurrency.cap()
                            ),
                        ));
                    }

                    accepted = kept;
                    state = SupervisorState::Dispatching;
                }
                SupervisorState::Dispatching => {
                    let mut round = std::mem::take(&mut accepted);
                    start_round(&mut round);
                    info!(
                        round = budget.current() + 1,
                        max = budget.max(),
                        topics = round.len(),
                        "Supervisor dispatching"
                    );

                    let outcomes = self.fan_out(&round, concurrency).await;

                    for ((call, mut task), outcome) in round.into_iter().zip(outcomes) {
                        match outcome {
                            Ok(result) => {
                                notes.push_success(&task.topic, &result.artifact);
                                transcript.push(TranscriptEntry::result_for(
                                    &call,
                                    true,
                                    result.artifact.compressed.clone(),
                                ));
                                task.succeed(result.artifact, result.iterations);
                            }
                            Err(error) => {
                                warn!(topic = %task.topic, error = %error, "Research task failed");
                                notes.push_failure(&task.topic, &error);
                                transcript.push(TranscriptEntry::result_for(
                                    &call,
                                    false,
                                    format!("Research failed: {}", error),
                                ));
                                task.fail(error);
                            }
                        }
                        tasks.push(task);
                    }

                    budget.advance();
                    state = SupervisorState::Planning;
                }
                SupervisorState::Terminating => {
                    state = SupervisorState::Done;
                }
                SupervisorState::Done => {}
            }
        }

        Ok(SupervisorOutcome {
            notes,
            tasks,
            rounds: budget.current(),
        })
    }

    /// Run every accepted task and return outcomes in dispatch order.
    ///
    /// Tasks must already be `Running`.
    async fn fan_out(
        &self,
        round: &[(ToolCall, ResearchTask)],
        concurrency: ConcurrencyBudget,
    ) -> Vec<Result<ResearcherOutcome, String>> {
        let semaphore = Arc::new(Semaphore::new(concurrency.cap()));
        let mut set = JoinSet::new();

        for (idx, (_, task)) in round.iter().enumerate() {
            debug_assert_eq!(task.status, TaskStatus::Running);
            let researcher = Arc::clone(&self.researcher);
            let semaphore = Arc::clone(&semaphore);
            let topic = task.topic.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (idx, researcher.run(&topic).await)
            });
        }

        let mut slots: Vec<Option<Result<ResearcherOutcome, String>>> =
            (0..round.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result.map_err(|e| e.to_string())),
                Err(e) => warn!(error = %e, "Researcher task aborted"),
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err("researcher task aborted".to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: format!("{}-id", name),
            name: name.to_string(),
            arguments: args,
        }
    }

    #[test]
    fn test_classify_splits_calls() {
        let plan = classify(vec![
            call(CONDUCT_RESEARCH, json!({"research_topic": "LFP cathodes"})),
            call(CONDUCT_RESEARCH, json!({"research_topic": "  "})),
            call("think", json!({"reflection": "start narrow"})),
            call("fetch_page", json!({})),
        ]);
        assert_eq!(plan.topics.len(), 1);
        assert_eq!(plan.topics[0].1.topic, "LFP cathodes");
        assert_eq!(plan.reflections.len(), 1);
        assert_eq!(plan.rejected.len(), 2);
        assert!(!plan.complete);
        assert!(!plan.empty);
    }

    #[test]
    fn test_budgets_map_to_their_loops() {
        let research = ResearchConfig {
            max_researcher_iterations: 3,
            max_react_tool_calls: 9,
            ..ResearchConfig::default()
        };
        assert_eq!(SupervisorConfig::from(&research).max_iterations, 3);
        assert_eq!(
            crate::research::ResearcherConfig::from(&research).max_iterations,
            9
        );
    }

    #[test]
    fn test_dispatched_tasks_are_running() {
        let mut plan = classify(vec![
            call(CONDUCT_RESEARCH, json!({"research_topic": "LFP cathodes"})),
            call(CONDUCT_RESEARCH, json!({"research_topic": "sodium-ion"})),
        ]);
        assert!(plan
            .topics
            .iter()
            .all(|(_, task)| task.status == TaskStatus::Pending));

        start_round(&mut plan.topics);
        assert!(plan
            .topics
            .iter()
            .all(|(_, task)| task.status == TaskStatus::Running));

        let (_, task) = &mut plan.topics[0];
        task.fail("boom");
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_classify_completion_and_empty() {
        assert!(classify(vec![call(RESEARCH_COMPLETE, json!({}))]).complete);
        assert!(classify(Vec::new()).empty);
    }
}
