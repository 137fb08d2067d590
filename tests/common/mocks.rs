//! Mock implementations for testing.
//!
//! [`MockLLMClient`] routes every request through a closure so a test can script
//! the supervisor, the researchers and the structured calls from one place. It
//! records every request and the peak number of requests in flight.

#![allow(dead_code)]

use async_trait::async_trait;
use delve::llm::{LLMClient, LLMResponse};
use delve::tools::{SearchProvider, SearchQuery};
use delve::types::{DecisionError, SearchResult, ToolCall, ToolDefinition, ToolError, TranscriptEntry};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub enum MockRequest {
    Text {
        system: String,
        prompt: String,
    },
    Tools {
        system: String,
        history: Vec<TranscriptEntry>,
        tools: Vec<String>,
    },
    Structured {
        system: String,
        prompt: String,
        schema_name: String,
    },
}

impl MockRequest {
    /// Supervisor decisions are the only ones offered `conduct_research`.
    pub fn is_supervisor(&self) -> bool {
        matches!(self, MockRequest::Tools { tools, .. } if tools.iter().any(|t| t == "conduct_research"))
    }

    pub fn is_researcher(&self) -> bool {
        matches!(self, MockRequest::Tools { .. }) && !self.is_supervisor()
    }

    /// Topic of a researcher decision: its first user turn.
    pub fn researcher_topic(&self) -> Option<&str> {
        match self {
            MockRequest::Tools { history, .. } => history.iter().find_map(|e| match e {
                TranscriptEntry::UserTurn { content } => Some(content.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Number of tool results already in a decision's history.
    pub fn tool_results(&self) -> usize {
        match self {
            MockRequest::Tools { history, .. } => history
                .iter()
                .filter(|e| matches!(e, TranscriptEntry::ToolCallResult { .. }))
                .count(),
            _ => 0,
        }
    }

    pub fn schema_name(&self) -> Option<&str> {
        match self {
            MockRequest::Structured { schema_name, .. } => Some(schema_name),
            _ => None,
        }
    }

    pub fn system(&self) -> &str {
        match self {
            MockRequest::Text { system, .. }
            | MockRequest::Tools { system, .. }
            | MockRequest::Structured { system, .. } => system,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            MockRequest::Text { prompt, .. } | MockRequest::Structured { prompt, .. } => prompt,
            MockRequest::Tools { .. } => "",
        }
    }
}

/// What the scripted handler answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Tools(LLMResponse),
    Json(Value),
}

type Handler = dyn Fn(&MockRequest) -> Result<MockReply, DecisionError> + Send + Sync;

pub struct MockLLMClient {
    handler: Box<Handler>,
    requests: Mutex<Vec<MockRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl MockLLMClient {
    pub fn new(
        handler: impl Fn(&MockRequest) -> Result<MockReply, DecisionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Hold every request for `delay` so overlapping calls are observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A client that fails every call as unreachable.
    pub fn unreachable() -> Self {
        Self::new(|_| Err(DecisionError::Unreachable("connection refused".to_string())))
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of researcher decisions that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn dispatch(&self, request: MockRequest) -> Result<MockReply, DecisionError> {
        self.requests.lock().push(request.clone());

        let tracked = request.is_researcher();
        if tracked {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = (self.handler)(&request);
        if tracked {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        reply
    }
}

fn mismatch(expected: &str, got: &MockReply) -> DecisionError {
    DecisionError::InvalidOutput(format!("mock expected {} reply, got {:?}", expected, got))
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String, DecisionError> {
        let request = MockRequest::Text {
            system: system.to_string(),
            prompt: prompt.to_string(),
        };
        match self.dispatch(request).await? {
            MockReply::Text(text) => Ok(text),
            other => Err(mismatch("text", &other)),
        }
    }

    async fn generate_with_tools_and_history(
        &self,
        system: &str,
        history: &[TranscriptEntry],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, DecisionError> {
        let request = MockRequest::Tools {
            system: system.to_string(),
            history: history.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        };
        match self.dispatch(request).await? {
            MockReply::Tools(response) => Ok(response),
            MockReply::Text(content) => Ok(LLMResponse {
                content,
                tool_calls: vec![],
                finish_reason: "stop".to_string(),
            }),
            other => Err(mismatch("tool-calling", &other)),
        }
    }

    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema_name: &str,
        _schema: &Value,
    ) -> Result<Value, DecisionError> {
        let request = MockRequest::Structured {
            system: system.to_string(),
            prompt: prompt.to_string(),
            schema_name: schema_name.to_string(),
        };
        match self.dispatch(request).await? {
            MockReply::Json(value) => Ok(value),
            other => Err(mismatch("json", &other)),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============= Reply helpers =============

static CALL_SEQ: AtomicUsize = AtomicUsize::new(0);

pub fn tool_call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: format!("call_{}", CALL_SEQ.fetch_add(1, Ordering::SeqCst)),
        name: name.to_string(),
        arguments,
    }
}

pub fn calls(content: &str, tool_calls: Vec<ToolCall>) -> MockReply {
    MockReply::Tools(LLMResponse {
        content: content.to_string(),
        tool_calls,
        finish_reason: "tool_calls".to_string(),
    })
}

pub fn conduct(topics: &[&str]) -> MockReply {
    calls(
        "Delegating research.",
        topics
            .iter()
            .map(|t| tool_call("conduct_research", json!({ "research_topic": t })))
            .collect(),
    )
}

pub fn complete() -> MockReply {
    calls("Research is sufficient.", vec![tool_call("research_complete", json!({}))])
}

pub fn search(query: &str) -> MockReply {
    calls(
        "Searching.",
        vec![tool_call("web_search", json!({ "queries": [query] }))],
    )
}

pub fn no_clarification() -> MockReply {
    MockReply::Json(json!({
        "need_clarification": false,
        "question": "",
        "verification": "I have enough information and will start researching now."
    }))
}

pub fn brief(text: &str) -> MockReply {
    MockReply::Json(json!({ "research_brief": text }))
}

/// The text between the first `open` and the following `close`.
pub fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(text[start..end].trim())
}

/// Script for a full, unambiguous run.
///
/// The supervisor delegates `topics` in its first round and completes in the
/// second. Each researcher searches once, then answers. Compression echoes the
/// topic and the report echoes the brief.
pub fn happy_path(
    brief_text: &'static str,
    topics: Vec<&'static str>,
) -> impl Fn(&MockRequest) -> Result<MockReply, DecisionError> + Send + Sync + 'static {
    move |request| {
        if request.is_supervisor() {
            return Ok(if request.tool_results() == 0 {
                conduct(&topics)
            } else {
                complete()
            });
        }
        if let Some(topic) = request.researcher_topic() {
            return Ok(if request.tool_results() == 0 {
                search(topic)
            } else {
                MockReply::Text("Enough sources gathered.".to_string())
            });
        }
        match request.schema_name() {
            Some("ClarificationDecision") => return Ok(no_clarification()),
            Some("ResearchQuestion") => return Ok(brief(brief_text)),
            Some(_) => {
                return Ok(MockReply::Json(json!({
                    "summary": "Page summary.",
                    "key_excerpts": ""
                })))
            }
            None => {}
        }
        if let Some(topic) = between(request.prompt(), "<Topic>", "</Topic>") {
            return Ok(MockReply::Text(format!("Compressed findings on {}", topic)));
        }
        let brief = between(request.prompt(), "<Research Brief>", "</Research Brief>")
            .unwrap_or_default();
        Ok(MockReply::Text(format!("# Report\n\n{}\n\nFindings follow.", brief)))
    }
}

// ============= Search =============

type SearchHandler = dyn Fn(&SearchQuery) -> Result<Vec<SearchResult>, ToolError> + Send + Sync;

/// Search provider backed by a closure. Records every query it receives.
pub struct MockSearchProvider {
    handler: Box<SearchHandler>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockSearchProvider {
    pub fn new(
        handler: impl Fn(&SearchQuery) -> Result<Vec<SearchResult>, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// One result per query, with a URL derived from the query text.
    pub fn per_query() -> Self {
        Self::new(|q| {
            Ok(vec![result(
                &format!("https://example.com/{}", q.query.replace(' ', "-")),
                &q.query,
            )])
        })
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ToolError> {
        self.queries.lock().push(query.clone());
        (self.handler)(query)
    }
}

pub fn result(url: &str, title: &str) -> SearchResult {
    SearchResult {
        url: url.to_string(),
        title: title.to_string(),
        raw_content: format!("Raw content of {}", title),
        summary: None,
    }
}

