//! Multi-query web search with URL dedup and per-page summaries
//!
//! One `web_search` call carries several queries. Each query goes to the
//! configured [`SearchProvider`] concurrently; results are merged in query
//! order, deduplicated by URL against everything already returned for the
//! current topic, then summarized page by page with the summarization model.
//! A page whose summary fails or times out falls back to its truncated raw
//! content.

use crate::llm::client::LLMClient;
use crate::llm::structured::generate_typed;
use crate::research::prompts;
use crate::tools::registry::{Tool, ToolContext};
use crate::types::{DecisionError, SearchResult, ToolError};
use crate::utils::toml_config::SearchConfig;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Message returned when a batch yields nothing new.
pub const NO_RESULTS: &str = "No valid search results found. Please try different search queries.";

/// One query sent to a search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    pub topic: String,
}

/// Backend that turns a query into ordered results. Empty results are not an error.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError>;
}

// ============= Tavily =============

const TAVILY_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

/// Tavily search API client.
pub struct TavilySearchProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilySearchProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, TAVILY_BASE_URL)
    }

    /// Point at a different endpoint, e.g. a proxy or a mock server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError> {
        let body = json!({
            "query": query.query,
            "max_results": query.max_results,
            "topic": query.topic,
            "include_raw_content": true,
        });

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Provider(format!("Tavily request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::Provider(format!(
                "Tavily request failed ({}): {}",
                status, text
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Provider(format!("Failed to parse Tavily response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|hit| SearchResult {
                raw_content: hit.raw_content.filter(|c| !c.is_empty()).unwrap_or(hit.content),
                url: hit.url,
                title: hit.title,
                summary: None,
            })
            .collect())
    }
}

// ============= DuckDuckGo =============

/// DuckDuckGo search through daedra. The result description stands in for page content.
#[derive(Default)]
pub struct DuckDuckGoSearchProvider;

#[async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError> {
        let search_args = daedra::SearchArgs {
            query: query.query.clone(),
            options: Some(daedra::SearchOptions {
                num_results: query.max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| ToolError::Provider(format!("DuckDuckGo search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .map(|r| SearchResult {
                url: r.url.clone(),
                title: r.title.clone(),
                raw_content: r.description.clone(),
                summary: None,
            })
            .collect())
    }
}

// ============= Summarization =============

#[derive(Debug, Deserialize, JsonSchema)]
struct WebpageSummary {
    /// Main findings of the page
    summary: String,
    /// Verbatim quotes worth keeping
    #[serde(default)]
    key_excerpts: String,
}

/// Summarizes a single page with the summarization model under a timeout.
pub struct WebpageSummarizer {
    client: Arc<dyn LLMClient>,
    timeout: Duration,
}

impl WebpageSummarizer {
    pub fn new(client: Arc<dyn LLMClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn summarize(&self, content: &str) -> Result<String, DecisionError> {
        let prompt = prompts::summarize_webpage(content);
        let call = generate_typed::<WebpageSummary>(
            self.client.as_ref(),
            prompts::SUMMARIZE_WEBPAGE_SYSTEM,
            &prompt,
        );
        let summary = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                DecisionError::Unreachable(format!(
                    "summarization timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        if summary.key_excerpts.trim().is_empty() {
            Ok(format!("<summary>\n{}\n</summary>", summary.summary.trim()))
        } else {
            Ok(format!(
                "<summary>\n{}\n</summary>\n\n<key_excerpts>\n{}\n</key_excerpts>",
                summary.summary.trim(),
                summary.key_excerpts.trim()
            ))
        }
    }
}

// ============= Tool =============

/// Drop repeats within the batch and URLs already returned for this topic.
/// First occurrence wins. Nothing is claimed in `ctx`.
pub fn dedup_results(results: Vec<SearchResult>, ctx: &ToolContext) -> Vec<SearchResult> {
    let mut batch = HashSet::new();
    results
        .into_iter()
        .filter(|r| !ctx.has_seen(&r.url) && batch.insert(r.url.clone()))
        .collect()
}

/// Render summarized results for the model.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut out = String::from("Search results:\n\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n\n--- SOURCE {}: {} ---\nURL: {}\n\nSUMMARY:\n{}\n\n{}\n",
            i + 1,
            r.title,
            r.url,
            r.summary.as_deref().unwrap_or(&r.raw_content),
            "-".repeat(80)
        ));
    }
    out
}

/// The `web_search` tool.
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
    summarizer: Option<WebpageSummarizer>,
    settings: SearchConfig,
}

impl SearchTool {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        summarizer: Option<WebpageSummarizer>,
        settings: SearchConfig,
    ) -> Self {
        Self {
            provider,
            summarizer,
            settings,
        }
    }

    fn parse_queries(args: &Value) -> Result<Vec<String>, ToolError> {
        let invalid = |message: &str| ToolError::InvalidArguments {
            tool: "web_search".to_string(),
            message: message.to_string(),
        };

        let queries = args
            .get("queries")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("'queries' must be an array of strings"))?;

        if queries.is_empty() {
            return Err(invalid("'queries' must not be empty"));
        }

        queries
            .iter()
            .map(|q| match q.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                _ => Err(invalid("every query must be a non-empty string")),
            })
            .collect()
    }

    async fn summarize_one(&self, mut result: SearchResult) -> SearchResult {
        let content = truncate_chars(&result.raw_content, self.settings.max_content_length);
        let summary = match &self.summarizer {
            Some(summarizer) => match summarizer.summarize(&content).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(url = %result.url, error = %e, "Summarization failed, using raw content");
                    content
                }
            },
            None => content,
        };
        result.summary = Some(summary);
        result
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web with one or more queries. Returns deduplicated, summarized results."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Search queries to run"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum results per query"
                },
                "topic": {
                    "type": "string",
                    "enum": ["general", "news", "finance"],
                    "description": "Topic filter"
                }
            },
            "required": ["queries"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let queries = Self::parse_queries(&args)?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.max_results);
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .unwrap_or(&self.settings.topic)
            .to_string();

        let requests: Vec<SearchQuery> = queries
            .iter()
            .map(|q| SearchQuery {
                query: q.clone(),
                max_results,
                topic: topic.clone(),
            })
            .collect();

        let outcomes = join_all(requests.iter().map(|q| self.provider.search(q))).await;

        let mut merged = Vec::new();
        let mut failures = Vec::new();
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(results) => merged.extend(results),
                Err(e) => {
                    warn!(provider = self.provider.name(), query = %query, error = %e, "Search query failed");
                    failures.push(e.to_string());
                }
            }
        }

        if failures.len() == queries.len() {
            return Err(ToolError::Provider(failures.join("; ")));
        }

        let fresh = dedup_results(merged, ctx);
        debug!(queries = queries.len(), results = fresh.len(), "Search batch merged");

        let summarized = join_all(fresh.into_iter().map(|r| self.summarize_one(r))).await;

        // claim only once the batch is ready, so a cancelled call leaves no trace
        let returned: Vec<SearchResult> = summarized
            .into_iter()
            .filter(|r| ctx.claim_url(&r.url))
            .collect();

        Ok(format_results(&returned))
    }
}
