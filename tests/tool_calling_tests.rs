//! Tool adapter and researcher-loop tool handling.

mod common;

use common::mocks::{calls, happy_path, result, tool_call, MockLLMClient, MockReply, MockSearchProvider};
use delve::research::{ResearcherConfig, ResearcherLoop};
use delve::tools::registry::ToolContext;
use delve::tools::search::NO_RESULTS;
use delve::tools::{research_registry, SearchTool, ToolRegistry, WebpageSummarizer};
use delve::types::{DecisionError, ToolError, TranscriptEntry};
use delve::utils::toml_config::SearchConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn summarizing_client() -> Arc<MockLLMClient> {
    Arc::new(MockLLMClient::new(|request| {
        Ok(MockReply::Json(json!({
            "summary": format!("summary of {}", request.prompt().len()),
            "key_excerpts": "\"a quote\""
        })))
    }))
}

fn search_tool(provider: Arc<MockSearchProvider>, summarizer: Option<WebpageSummarizer>) -> SearchTool {
    SearchTool::new(provider, summarizer, SearchConfig::default())
}

#[tokio::test]
async fn test_duplicate_urls_in_one_batch_are_collapsed() {
    let provider = Arc::new(MockSearchProvider::new(|_| {
        Ok(vec![
            result("http://a", "First title"),
            result("http://a", "Second title"),
            result("http://b", "Other page"),
        ])
    }));
    let registry = research_registry(Some(search_tool(provider, None)));
    let ctx = ToolContext::new();

    let text = registry
        .invoke("web_search", json!({ "queries": ["X"] }), &ctx)
        .await
        .unwrap();

    assert_eq!(text.matches("URL: http://a\n").count(), 1);
    assert!(text.contains("First title"));
    assert!(!text.contains("Second title"));
    assert!(text.find("http://a").unwrap() < text.find("http://b").unwrap());
    assert_eq!(ctx.seen_count(), 2);
}

#[tokio::test]
async fn test_urls_seen_earlier_in_the_topic_are_dropped() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![result("http://a", "A")])));
    let registry = research_registry(Some(search_tool(provider, None)));
    let ctx = ToolContext::new();

    let first = registry
        .invoke("web_search", json!({ "queries": ["one"] }), &ctx)
        .await
        .unwrap();
    assert!(first.contains("http://a"));

    let second = registry
        .invoke("web_search", json!({ "queries": ["two"] }), &ctx)
        .await
        .unwrap();
    assert_eq!(second, NO_RESULTS);

    let other_topic = registry
        .invoke("web_search", json!({ "queries": ["two"] }), &ToolContext::new())
        .await
        .unwrap();
    assert!(other_topic.contains("http://a"));
}

#[tokio::test]
async fn test_each_query_hits_the_provider() {
    let provider = Arc::new(MockSearchProvider::per_query());
    let registry = research_registry(Some(search_tool(provider.clone(), None)));

    registry
        .invoke(
            "web_search",
            json!({ "queries": ["alpha", "beta"], "max_results": 3, "topic": "news" }),
            &ToolContext::new(),
        )
        .await
        .unwrap();

    let mut seen = provider.queries();
    seen.sort_by(|a, b| a.query.cmp(&b.query));
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].query, "alpha");
    assert_eq!(seen[0].max_results, 3);
    assert_eq!(seen[1].topic, "news");
}

#[tokio::test]
async fn test_partial_provider_failure_keeps_other_results() {
    let provider = Arc::new(MockSearchProvider::new(|q| {
        if q.query == "broken" {
            Err(ToolError::Provider("HTTP 500".to_string()))
        } else {
            Ok(vec![result("http://ok", "Fine")])
        }
    }));
    let registry = research_registry(Some(search_tool(provider, None)));

    let text = registry
        .invoke(
            "web_search",
            json!({ "queries": ["broken", "fine"] }),
            &ToolContext::new(),
        )
        .await
        .unwrap();
    assert!(text.contains("http://ok"));
}

#[tokio::test]
async fn test_total_provider_failure_is_tool_error() {
    let provider = Arc::new(MockSearchProvider::new(|_| {
        Err(ToolError::Provider("rate limited".to_string()))
    }));
    let registry = research_registry(Some(search_tool(provider, None)));

    let err = registry
        .invoke("web_search", json!({ "queries": ["a", "b"] }), &ToolContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Provider(msg) if msg.contains("rate limited")));
}

#[tokio::test]
async fn test_empty_results_are_not_an_error() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![])));
    let registry = research_registry(Some(search_tool(provider, None)));

    let text = registry
        .invoke("web_search", json!({ "queries": ["nothing"] }), &ToolContext::new())
        .await
        .unwrap();
    assert_eq!(text, NO_RESULTS);
}

#[tokio::test]
async fn test_summaries_replace_raw_content() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![result("http://a", "A")])));
    let summarizer = WebpageSummarizer::new(summarizing_client(), Duration::from_secs(5));
    let registry = research_registry(Some(search_tool(provider, Some(summarizer))));

    let text = registry
        .invoke("web_search", json!({ "queries": ["q"] }), &ToolContext::new())
        .await
        .unwrap();
    assert!(text.contains("<summary>"));
    assert!(text.contains("<key_excerpts>"));
    assert!(!text.contains("Raw content of A"));
}

#[tokio::test]
async fn test_summarization_failure_falls_back_to_raw_content() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![result("http://a", "A")])));
    let summarizer = WebpageSummarizer::new(
        Arc::new(MockLLMClient::unreachable()),
        Duration::from_secs(5),
    );
    let registry = research_registry(Some(search_tool(provider, Some(summarizer))));

    let text = registry
        .invoke("web_search", json!({ "queries": ["q"] }), &ToolContext::new())
        .await
        .unwrap();
    assert!(text.contains("Raw content of A"));
    assert!(!text.contains("<summary>"));
}

#[tokio::test]
async fn test_summarization_timeout_falls_back_to_raw_content() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![result("http://a", "A")])));
    let slow = Arc::new(
        MockLLMClient::new(|_| Ok(MockReply::Json(json!({ "summary": "late" }))))
            .with_delay(Duration::from_millis(500)),
    );
    let summarizer = WebpageSummarizer::new(slow, Duration::from_millis(20));
    let registry = research_registry(Some(search_tool(provider, Some(summarizer))));

    let text = registry
        .invoke("web_search", json!({ "queries": ["q"] }), &ToolContext::new())
        .await
        .unwrap();
    assert!(text.contains("Raw content of A"));
}

#[tokio::test]
async fn test_timed_out_search_leaves_urls_unclaimed() {
    let provider = Arc::new(MockSearchProvider::new(|_| Ok(vec![result("http://a", "A")])));
    let slow = Arc::new(
        MockLLMClient::new(|_| Ok(MockReply::Json(json!({ "summary": "page a" }))))
            .with_delay(Duration::from_millis(300)),
    );
    let summarizer = WebpageSummarizer::new(slow, Duration::from_secs(5));
    let registry = research_registry(Some(search_tool(provider, Some(summarizer))));
    let ctx = ToolContext::new();
    let call = tool_call("web_search", json!({ "queries": ["sodium-ion"] }));

    let cut_short = registry
        .execute_call(&call, &ctx, Duration::from_millis(50))
        .await;
    assert!(!cut_short.success);
    assert_eq!(
        cut_short.error.as_deref(),
        Some("Tool 'web_search' timed out after 50ms")
    );
    assert_eq!(ctx.seen_count(), 0);

    let retried = registry
        .execute_call(&call, &ctx, Duration::from_secs(5))
        .await;
    assert!(retried.success);
    assert!(retried.result.contains("URL: http://a"));
    assert!(retried.result.contains("page a"));
    assert_eq!(ctx.seen_count(), 1);
}

#[tokio::test]
async fn test_invalid_search_arguments() {
    let provider = Arc::new(MockSearchProvider::per_query());
    let registry = research_registry(Some(search_tool(provider.clone(), None)));

    for args in [json!({}), json!({ "queries": [] }), json!({ "queries": ["ok", ""] })] {
        let err = registry
            .invoke("web_search", args, &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
    assert!(provider.queries().is_empty());
}

#[tokio::test]
async fn test_think_is_always_registered() {
    let registry = research_registry(None);
    assert_eq!(registry.tool_names(), vec!["think".to_string()]);

    let text = registry
        .invoke("think", json!({ "reflection": "need primary sources" }), &ToolContext::new())
        .await
        .unwrap();
    assert!(text.contains("need primary sources"));
}

#[tokio::test]
async fn test_tool_failure_is_shown_to_researcher() {
    let llm = Arc::new(MockLLMClient::new(|request| {
        if request.is_researcher() {
            return Ok(match request.tool_results() {
                0 => calls("Trying a tool.", vec![tool_call("fetch_page", json!({ "url": "x" }))]),
                _ => MockReply::Text("Giving up on that tool.".to_string()),
            });
        }
        happy_path("unused", vec![])(request)
    }));
    let researcher = ResearcherLoop::new(
        llm.clone(),
        llm.clone(),
        Arc::new(ToolRegistry::new()),
        ResearcherConfig {
            max_iterations: 3,
            tool_timeout: Duration::from_secs(1),
            compressed_max_chars: 1000,
        },
    );

    let outcome = researcher.run("page fetching").await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.tool_calls.len(), 1);
    assert!(!outcome.tool_calls[0].success);

    let second_decision = llm
        .requests()
        .into_iter()
        .filter(|r| r.is_researcher())
        .nth(1)
        .unwrap();
    let common::mocks::MockRequest::Tools { history, .. } = second_decision else {
        unreachable!();
    };
    assert!(history.iter().any(|e| matches!(
        e,
        TranscriptEntry::ToolCallResult { success: false, content, .. }
            if content.contains("fetch_page")
    )));
    assert_eq!(outcome.artifact.compressed, "Compressed findings on page fetching");
}

#[tokio::test]
async fn test_research_complete_stops_the_loop() {
    let llm = Arc::new(MockLLMClient::new(|request| {
        if request.is_researcher() {
            return Ok(calls(
                "Done.",
                vec![tool_call("research_complete", json!({}))],
            ));
        }
        happy_path("unused", vec![])(request)
    }));
    let researcher = ResearcherLoop::new(
        llm.clone(),
        llm.clone(),
        Arc::new(research_registry(None)),
        ResearcherConfig::default(),
    );

    let outcome = researcher.run("nothing to do").await.unwrap();
    assert_eq!(outcome.iterations, 0);
    assert!(outcome.tool_calls.is_empty());
    assert!(outcome.artifact.raw_notes.is_empty());
}

#[tokio::test]
async fn test_compression_is_bounded() {
    let llm = Arc::new(MockLLMClient::new(|request| {
        if request.is_researcher() {
            return Ok(MockReply::Text("Nothing needed.".to_string()));
        }
        Ok(MockReply::Text("x".repeat(500)))
    }));
    let researcher = ResearcherLoop::new(
        llm.clone(),
        llm,
        Arc::new(research_registry(None)),
        ResearcherConfig {
            compressed_max_chars: 100,
            ..ResearcherConfig::default()
        },
    );

    let outcome = researcher.run("bounded").await.unwrap();
    assert!(outcome.artifact.compressed.chars().count() <= 100);
}

#[tokio::test]
async fn test_decision_failure_ends_researcher() {
    let llm = Arc::new(MockLLMClient::unreachable());
    let researcher = ResearcherLoop::new(
        llm.clone(),
        llm,
        Arc::new(research_registry(None)),
        ResearcherConfig::default(),
    );

    let err = researcher.run("anything").await.unwrap_err();
    assert!(matches!(err, DecisionError::Unreachable(_)));
}
