//! Research Tools
//!
//! Tools are what researcher loops call to gather and reason about material.
//! Each returns plain text that goes straight into the transcript.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - Tool trait, registration and timed execution
//! - [`search`](crate::tools::search) - Multi-query web search (Tavily, DuckDuckGo)
//! - [`think`](crate::tools::think) - Reflection tool
//!
//! # Tool Context
//!
//! Every call receives a [`ToolContext`] scoped to one research topic. The
//! search tool uses it to drop URLs already returned earlier for that topic.
//!
//! ```ignore
//! let registry = research_registry(Some(search_tool));
//! let ctx = ToolContext::new();
//! let text = registry.invoke("think", json!({"reflection": "need sources"}), &ctx).await?;
//! ```

/// Tool registry for managing available tools.
pub mod registry;
/// Web search tool and search providers.
pub mod search;
/// Reflection tool.
pub mod think;

pub use registry::{Tool, ToolContext, ToolRegistry};
pub use search::{
    DuckDuckGoSearchProvider, SearchProvider, SearchQuery, SearchTool, TavilySearchProvider,
    WebpageSummarizer,
};
pub use think::ThinkTool;

use std::sync::Arc;

/// Registry with the researcher tool set: `think`, plus `web_search` when search is enabled.
pub fn research_registry(search: Option<SearchTool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ThinkTool));
    if let Some(search) = search {
        registry.register(Arc::new(search));
    }
    registry
}
