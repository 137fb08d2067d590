use crate::llm::client::LLMClient;
use crate::research::prompts;
use crate::types::{DecisionError, NoteSet};
use std::sync::Arc;

/// Writes the final report from the brief and the aggregated notes in one call.
pub struct ReportSynthesizer {
    client: Arc<dyn LLMClient>,
}

impl ReportSynthesizer {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    pub async fn synthesize(&self, brief: &str, notes: &NoteSet) -> Result<String, DecisionError> {
        let findings = if notes.notes().is_empty() {
            "No findings were gathered.".to_string()
        } else {
            notes.joined()
        };

        let report = self
            .client
            .generate_with_system(prompts::REPORT_SYSTEM, &prompts::final_report(brief, &findings))
            .await?;

        let report = report.trim();
        if report.is_empty() {
            return Err(DecisionError::InvalidOutput("empty final report".to_string()));
        }
        Ok(report.to_string())
    }
}
