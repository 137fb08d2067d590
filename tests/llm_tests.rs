//! HTTP clients against a local mock server.

use delve::llm::client::GenerationOptions;
use delve::llm::ollama::OllamaClient;
use delve::llm::openai::OpenAIClient;
use delve::llm::{generate_typed, LLMClient};
use delve::tools::{SearchProvider, SearchQuery, TavilySearchProvider};
use delve::types::{DecisionError, ToolCall, ToolDefinition, ToolError, TranscriptEntry};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new(
        "sk-test".to_string(),
        format!("{}/", server.uri()),
        "gpt-test".to_string(),
        GenerationOptions::default(),
    )
}

fn ollama(server: &MockServer) -> OllamaClient {
    OllamaClient::new(
        server.uri(),
        "qwen3:8b".to_string(),
        GenerationOptions {
            temperature: 0.2,
            max_tokens: 512,
        },
    )
    .unwrap()
}

fn completion(message: serde_json::Value, finish_reason: Option<&str>) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-test",
        "choices": [{ "index": 0, "message": message, "finish_reason": finish_reason }]
    })
}

fn ollama_reply(message: serde_json::Value) -> serde_json::Value {
    json!({
        "model": "qwen3:8b",
        "created_at": "2026-01-01T00:00:00Z",
        "message": message,
        "done": true,
        "done_reason": "stop"
    })
}

fn search_tool_def() -> ToolDefinition {
    ToolDefinition {
        name: "web_search".to_string(),
        description: "search".to_string(),
        parameters: json!({ "type": "object", "properties": { "queries": { "type": "array" } } }),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct Verdict {
    approved: bool,
}

#[tokio::test]
async fn test_openai_tool_calls_round_trip_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "max_completion_tokens": 4096,
            "tool_choice": "auto",
            "messages": [
                { "role": "system", "content": "sys" },
                { "role": "user", "content": "EV batteries" },
                {
                    "role": "assistant",
                    "tool_calls": [{ "id": "call_1", "type": "function" }]
                },
                { "role": "tool", "tool_call_id": "call_1" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_2",
                    "type": "function",
                    "function": {
                        "name": "web_search",
                        "arguments": "{\"queries\": [\"LFP prices 2024\"]}"
                    }
                }]
            }),
            Some("tool_calls"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall {
        id: "call_1".to_string(),
        name: "web_search".to_string(),
        arguments: json!({ "queries": ["EV batteries"] }),
    };
    let history = vec![
        TranscriptEntry::user("EV batteries"),
        TranscriptEntry::decision(""),
        TranscriptEntry::request(call.clone()),
        TranscriptEntry::result_for(&call, true, "Search results: ..."),
    ];

    let response = openai(&server)
        .generate_with_tools_and_history("sys", &history, &[search_tool_def()])
        .await
        .unwrap();

    assert_eq!(response.finish_reason, "tool_calls");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_2");
    assert_eq!(
        response.tool_calls[0].arguments,
        json!({ "queries": ["LFP prices 2024"] })
    );
}

#[tokio::test]
async fn test_openai_structured_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": { "type": "json_schema", "json_schema": { "name": "Verdict" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({ "role": "assistant", "content": "```json\n{\"approved\": true}\n```" }),
            Some("stop"),
        )))
        .mount(&server)
        .await;

    let client = openai(&server);
    let verdict: Verdict = generate_typed(&client, "sys", "decide").await.unwrap();
    assert!(verdict.approved);
}

#[tokio::test]
async fn test_openai_structured_output_schema_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({ "role": "assistant", "content": "{\"approved\": \"maybe\"}" }),
            None,
        )))
        .mount(&server)
        .await;

    let client = openai(&server);
    let err = generate_typed::<Verdict>(&client, "sys", "decide")
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::InvalidOutput(_)));
}

#[tokio::test]
async fn test_openai_http_error_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "model overloaded",
                "type": "invalid_request_error",
                "param": null,
                "code": null
            }
        })))
        .mount(&server)
        .await;

    let err = openai(&server)
        .generate_with_system("sys", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::Unreachable(msg) if msg.contains("overloaded")));
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let client = OpenAIClient::new(
        "sk-test".to_string(),
        "http://127.0.0.1:9".to_string(),
        "gpt-test".to_string(),
        GenerationOptions::default(),
    );
    let err = client.generate_with_system("sys", "hello").await.unwrap_err();
    assert!(matches!(err, DecisionError::Unreachable(_)));
}

#[tokio::test]
async fn test_ollama_text_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen3:8b",
            "stream": false,
            "options": { "num_predict": 512 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(
            json!({ "role": "assistant", "content": "# Report" }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let text = ollama(&server)
        .generate_with_system("sys", "write")
        .await
        .unwrap();
    assert_eq!(text, "# Report");
}

#[tokio::test]
async fn test_ollama_tool_calls_get_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [
                { "function": { "name": "think", "arguments": { "reflection": "narrow down" } } },
                { "function": { "name": "research_complete", "arguments": {} } }
            ]
        }))))
        .mount(&server)
        .await;

    let response = ollama(&server)
        .generate_with_tools_and_history(
            "sys",
            &[TranscriptEntry::user("topic")],
            &[search_tool_def()],
        )
        .await
        .unwrap();

    assert_eq!(response.finish_reason, "tool_calls");
    assert_eq!(response.tool_calls.len(), 2);
    assert_eq!(response.tool_calls[0].arguments["reflection"], "narrow down");
    assert!(!response.tool_calls[0].id.is_empty());
    assert_ne!(response.tool_calls[0].id, response.tool_calls[1].id);
}

#[tokio::test]
async fn test_ollama_structured_output_uses_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "format": { "type": "object" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(
            json!({ "role": "assistant", "content": "{\"approved\": false}" }),
        )))
        .mount(&server)
        .await;

    let client = ollama(&server);
    let verdict: Verdict = generate_typed(&client, "sys", "decide").await.unwrap();
    assert!(!verdict.approved);
}

#[tokio::test]
async fn test_ollama_server_error_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'qwen3:8b' not found"))
        .mount(&server)
        .await;

    let err = ollama(&server)
        .generate_with_system("sys", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::Unreachable(msg) if msg.contains("not found")));
}

fn query(q: &str) -> SearchQuery {
    SearchQuery {
        query: q.to_string(),
        max_results: 3,
        topic: "general".to_string(),
    }
}

#[tokio::test]
async fn test_tavily_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test"))
        .and(body_partial_json(json!({
            "query": "sodium-ion cells",
            "max_results": 3,
            "include_raw_content": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "url": "https://a.example",
                    "title": "A",
                    "content": "snippet a",
                    "raw_content": "full page a"
                },
                {
                    "url": "https://b.example",
                    "title": "B",
                    "content": "snippet b",
                    "raw_content": null
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = TavilySearchProvider::with_base_url("tvly-test", server.uri());
    let results = provider.search(&query("sodium-ion cells")).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].raw_content, "full page a");
    assert_eq!(results[1].raw_content, "snippet b");
    assert!(results.iter().all(|r| r.summary.is_none()));
}

#[tokio::test]
async fn test_tavily_empty_and_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "query": "nothing" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "query": "forbidden" })))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = TavilySearchProvider::with_base_url("tvly-test", server.uri());
    assert!(provider.search(&query("nothing")).await.unwrap().is_empty());

    let err = provider.search(&query("forbidden")).await.unwrap_err();
    assert!(matches!(err, ToolError::Provider(msg) if msg.contains("401")));
}
