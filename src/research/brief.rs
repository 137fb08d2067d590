use crate::llm::client::LLMClient;
use crate::llm::structured::generate_typed;
use crate::research::prompts;
use crate::types::{DecisionError, TranscriptEntry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Whether the request needs a clarifying question before research.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClarificationDecision {
    pub need_clarification: bool,
    /// Question for the user, when one is needed
    #[serde(default)]
    pub question: String,
    /// Confirmation that research will start, when no question is needed
    #[serde(default)]
    pub verification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResearchQuestion {
    /// The research brief guiding all further work
    pub research_brief: String,
}

/// Turns the conversation into a clarification decision and a research brief.
pub struct BriefBuilder {
    client: Arc<dyn LLMClient>,
}

impl BriefBuilder {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    pub async fn decide_clarification(
        &self,
        conversation: &[TranscriptEntry],
    ) -> Result<ClarificationDecision, DecisionError> {
        let decision: ClarificationDecision = generate_typed(
            self.client.as_ref(),
            prompts::CLARIFY_SYSTEM,
            &prompts::clarify_with_user(conversation),
        )
        .await?;

        if decision.need_clarification && decision.question.trim().is_empty() {
            return Err(DecisionError::InvalidOutput(
                "clarification requested without a question".to_string(),
            ));
        }

        tracing::debug!(
            need_clarification = decision.need_clarification,
            "Clarification decided"
        );
        Ok(decision)
    }

    pub async fn build_brief(
        &self,
        conversation: &[TranscriptEntry],
    ) -> Result<String, DecisionError> {
        let question: ResearchQuestion = generate_typed(
            self.client.as_ref(),
            prompts::BRIEF_SYSTEM,
            &prompts::research_brief(conversation),
        )
        .await?;

        let brief = question.research_brief.trim();
        if brief.is_empty() {
            return Err(DecisionError::InvalidOutput(
                "empty research brief".to_string(),
            ));
        }
        Ok(brief.to_string())
    }
}
