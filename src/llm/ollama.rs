use crate::llm::client::{GenerationOptions, LLMClient, LLMResponse};
use crate::llm::structured::parse_json_payload;
use crate::types::{AppError, DecisionError, ToolCall, ToolDefinition, TranscriptEntry};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::{
        chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
        parameters::{FormatType, JsonStructure},
        tools::{ToolCall as OllamaToolCall, ToolCallFunction, ToolFunctionInfo, ToolInfo, ToolType},
    },
    models::ModelOptions,
};
use schemars::Schema;
use serde_json::Value;

/// Client for a local Ollama server (`/api/chat`, non-streaming).
pub struct OllamaClient {
    client: Ollama,
    model: String,
    options: GenerationOptions,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, options: GenerationOptions) -> crate::types::Result<Self> {
        // requests are joined onto the base as "{base}api/chat"
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let client = Ollama::try_new(base.as_str()).map_err(|e| {
            AppError::Configuration(format!("Invalid Ollama base_url '{}': {}", base_url, e))
        })?;

        Ok(Self {
            client,
            model,
            options,
        })
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatMessageRequest {
        let options = ModelOptions::default()
            .temperature(self.options.temperature)
            .num_predict(i32::try_from(self.options.max_tokens).unwrap_or(i32::MAX));
        ChatMessageRequest::new(self.model.clone(), messages).options(options)
    }

    async fn chat(&self, request: ChatMessageRequest) -> Result<ChatMessageResponse, DecisionError> {
        self.client
            .send_chat_messages(request)
            .await
            .map_err(|e| match e {
                OllamaError::JsonError(err) => {
                    DecisionError::InvalidOutput(format!("Failed to parse response: {}", err))
                }
                OllamaError::ReqwestError(err) => {
                    DecisionError::Unreachable(format!("Ollama request failed: {}", err))
                }
                other => DecisionError::Unreachable(format!("Ollama API error: {}", other)),
            })
    }
}

fn system_and_user(system: &str, prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system.to_string()),
        ChatMessage::user(prompt.to_string()),
    ]
}

fn to_messages(system: &str, history: &[TranscriptEntry]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system.to_string())];

    for entry in history {
        match entry {
            TranscriptEntry::UserTurn { content } => {
                messages.push(ChatMessage::user(content.clone()));
            }
            TranscriptEntry::ModelDecision { content } => {
                messages.push(ChatMessage::assistant(content.clone()));
            }
            TranscriptEntry::ToolCallRequest { call } => {
                // Ollama takes arguments as an object, not a string
                let tool_call = OllamaToolCall {
                    function: ToolCallFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                };
                match messages.last_mut() {
                    Some(last) if last.role == MessageRole::Assistant => {
                        last.tool_calls.push(tool_call);
                    }
                    _ => {
                        let mut message = ChatMessage::assistant(String::new());
                        message.tool_calls.push(tool_call);
                        messages.push(message);
                    }
                }
            }
            TranscriptEntry::ToolCallResult { content, .. } => {
                messages.push(ChatMessage::tool(content.clone()));
            }
        }
    }

    messages
}

fn to_tools(tools: &[ToolDefinition]) -> Result<Vec<ToolInfo>, DecisionError> {
    tools
        .iter()
        .map(|t| {
            let parameters = Schema::try_from(t.parameters.clone()).map_err(|e| {
                DecisionError::InvalidOutput(format!(
                    "schema for tool '{}' is not a JSON schema: {}",
                    t.name, e
                ))
            })?;
            Ok(ToolInfo {
                tool_type: ToolType::Function,
                function: ToolFunctionInfo {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters,
                },
            })
        })
        .collect()
}

/// Convert a chat reply. Ollama does not assign call ids, so one is generated per call.
fn parse_response(response: &ChatMessageResponse) -> Result<LLMResponse, DecisionError> {
    let mut tool_calls = Vec::with_capacity(response.message.tool_calls.len());

    for call in &response.message.tool_calls {
        let name = call.function.name.clone();
        let arguments = match &call.function.arguments {
            Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                DecisionError::InvalidOutput(format!(
                    "arguments for '{}' are not valid JSON: {}",
                    name, e
                ))
            })?,
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        tool_calls.push(ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            arguments,
        });
    }

    let finish_reason = match (tool_calls.is_empty(), response.done) {
        (false, _) => "tool_calls",
        (true, true) => "stop",
        (true, false) => "length",
    };

    Ok(LLMResponse {
        content: response.message.content.clone(),
        tool_calls,
        finish_reason: finish_reason.to_string(),
    })
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String, DecisionError> {
        let response = self.chat(self.request(system_and_user(system, prompt))).await?;
        Ok(response.message.content)
    }

    async fn generate_with_tools_and_history(
        &self,
        system: &str,
        history: &[TranscriptEntry],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, DecisionError> {
        let mut request = self.request(to_messages(system, history));
        if !tools.is_empty() {
            request = request.tools(to_tools(tools)?);
        }
        let response = self.chat(request).await?;
        parse_response(&response)
    }

    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, DecisionError> {
        let schema = Schema::try_from(schema.clone()).map_err(|e| {
            DecisionError::InvalidOutput(format!("'{}' is not a JSON schema: {}", schema_name, e))
        })?;
        let request = self
            .request(system_and_user(system, prompt))
            .format(FormatType::StructuredJson(Box::new(
                JsonStructure::new_for_schema(schema),
            )));
        let response = self.chat(request).await?;
        parse_json_payload(&response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
