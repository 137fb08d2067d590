use crate::types::{ToolCall, ToolCallRecord, ToolDefinition, ToolError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Per-topic state shared by every tool call of one researcher loop.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    seen_urls: Arc<Mutex<HashSet<String>>>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `url` as returned. False if it was already returned for this topic.
    pub fn claim_url(&self, url: &str) -> bool {
        self.seen_urls.lock().insert(url.to_string())
    }

    /// Whether `url` was already returned. Does not claim it.
    pub fn has_seen(&self, url: &str) -> bool {
        self.seen_urls.lock().contains(url)
    }

    pub fn seen_count(&self) -> usize {
        self.seen_urls.lock().len()
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Definitions of every registered tool, sorted by name.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Run a tool by name.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args, ctx).await,
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    /// Execute a model-requested call with a timeout. Never fails: errors become a failed record.
    pub async fn execute_call(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        limit: Duration,
    ) -> ToolCallRecord {
        let start = Instant::now();

        let result = timeout(limit, self.invoke(&call.name, call.arguments.clone(), ctx)).await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(text)) => ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: text,
                success: true,
                duration_ms,
                error: None,
            },
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolCallRecord::failed(call, e.to_string(), duration_ms)
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool: call.name.clone(),
                    limit,
                };
                tracing::warn!(tool = %call.name, "Tool call timed out");
                ToolCallRecord::failed(call, e.to_string(), duration_ms)
            }
        }
    }

    /// Get a sorted list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
