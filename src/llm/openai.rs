use crate::llm::client::{GenerationOptions, LLMClient, LLMResponse};
use crate::llm::structured::parse_json_payload;
use crate::types::{DecisionError, ToolCall, ToolDefinition, TranscriptEntry};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FinishReason, FunctionCall, FunctionObject, ResponseFormat,
        ResponseFormatJsonSchema, ToolChoiceOptions,
    },
};
use async_trait::async_trait;
use serde_json::Value;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
    options: GenerationOptions,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, options: GenerationOptions) -> Self {
        // the SDK appends "/chat/completions" verbatim
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));

        Self {
            client: Client::with_config(config),
            model,
            options,
        }
    }

    fn request(&self) -> CreateChatCompletionRequestArgs {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(self.options.temperature)
            .max_completion_tokens(self.options.max_tokens);
        args
    }

    async fn chat(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, DecisionError> {
        self.client
            .chat()
            .create(request)
            .await
            .map_err(|e| match e {
                OpenAIError::JSONDeserialize(err, _) => {
                    DecisionError::InvalidOutput(format!("Failed to parse response: {}", err))
                }
                other => DecisionError::Unreachable(format!("OpenAI API error: {}", other)),
            })
    }
}

fn build_error(e: OpenAIError) -> DecisionError {
    DecisionError::InvalidOutput(format!("Failed to build request: {}", e))
}

fn system_and_user(system: &str, prompt: &str) -> Vec<ChatCompletionRequestMessage> {
    vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(system)),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(prompt)),
    ]
}

fn assistant(
    content: Option<&str>,
    tool_calls: Vec<ChatCompletionMessageToolCalls>,
) -> Result<ChatCompletionRequestMessage, DecisionError> {
    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
    if let Some(text) = content {
        args.content(ChatCompletionRequestAssistantMessageContent::Text(
            text.to_string(),
        ));
    }
    if !tool_calls.is_empty() {
        args.tool_calls(tool_calls);
    }
    Ok(ChatCompletionRequestMessage::Assistant(
        args.build().map_err(build_error)?,
    ))
}

/// Convert a transcript into chat messages.
///
/// Tool call requests are folded into the assistant message that precedes them.
pub(crate) fn to_messages(
    system: &str,
    history: &[TranscriptEntry],
) -> Result<Vec<ChatCompletionRequestMessage>, DecisionError> {
    let mut messages = vec![ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessage::from(system),
    )];

    for entry in history {
        match entry {
            TranscriptEntry::UserTurn { content } => {
                messages.push(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(content.as_str()),
                ));
            }
            TranscriptEntry::ModelDecision { content } => {
                messages.push(assistant(Some(content), Vec::new())?);
            }
            TranscriptEntry::ToolCallRequest { call } => {
                let tool_call = ChatCompletionMessageToolCalls::Function(
                    ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    },
                );
                match messages.last_mut() {
                    Some(ChatCompletionRequestMessage::Assistant(last)) => {
                        last.tool_calls.get_or_insert_with(Vec::new).push(tool_call);
                    }
                    _ => messages.push(assistant(None, vec![tool_call])?),
                }
            }
            TranscriptEntry::ToolCallResult {
                call_id, content, ..
            } => {
                messages.push(ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessage {
                        content: ChatCompletionRequestToolMessageContent::Text(content.clone()),
                        tool_call_id: call_id.clone(),
                    },
                ));
            }
        }
    }

    Ok(messages)
}

fn to_tools(tools: &[ToolDefinition]) -> Vec<ChatCompletionTools> {
    tools
        .iter()
        .map(|t| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: t.name.clone(),
                    description: Some(t.description.clone()),
                    parameters: Some(t.parameters.clone()),
                    strict: None,
                },
            })
        })
        .collect()
}

fn finish_reason_label(reason: Option<FinishReason>) -> String {
    match reason {
        Some(FinishReason::Length) => "length",
        Some(FinishReason::ToolCalls) => "tool_calls",
        Some(FinishReason::ContentFilter) => "content_filter",
        Some(FinishReason::FunctionCall) => "function_call",
        Some(FinishReason::Stop) | None => "stop",
    }
    .to_string()
}

fn first_text(response: &CreateChatCompletionResponse) -> Result<String, DecisionError> {
    response
        .choices
        .first()
        .map(|choice| choice.message.content.clone().unwrap_or_default())
        .ok_or_else(|| DecisionError::InvalidOutput("No choices in response".into()))
}

/// Convert a completion into an [`LLMResponse`].
pub(crate) fn parse_response(
    response: &CreateChatCompletionResponse,
) -> Result<LLMResponse, DecisionError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| DecisionError::InvalidOutput("No choices in response".into()))?;

    let mut tool_calls = Vec::new();
    for call in choice.message.tool_calls.iter().flatten() {
        let ChatCompletionMessageToolCalls::Function(call) = call else {
            return Err(DecisionError::InvalidOutput(
                "custom tool calls are not supported".into(),
            ));
        };
        let arguments: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
            DecisionError::InvalidOutput(format!(
                "arguments for '{}' are not valid JSON: {}",
                call.function.name, e
            ))
        })?;
        tool_calls.push(ToolCall {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments,
        });
    }

    Ok(LLMResponse {
        content: choice.message.content.clone().unwrap_or_default(),
        tool_calls,
        finish_reason: finish_reason_label(choice.finish_reason),
    })
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String, DecisionError> {
        let request = self
            .request()
            .messages(system_and_user(system, prompt))
            .build()
            .map_err(build_error)?;

        let response = self.chat(request).await?;
        first_text(&response)
    }

    async fn generate_with_tools_and_history(
        &self,
        system: &str,
        history: &[TranscriptEntry],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, DecisionError> {
        let mut args = self.request();
        args.messages(to_messages(system, history)?);
        if !tools.is_empty() {
            args.tools(to_tools(tools))
                .tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto));
        }
        let request = args.build().map_err(build_error)?;

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
        let request = self
            .request()
            .messages(system_and_user(system, prompt))
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: schema_name.to_string(),
                    schema: Some(schema.clone()),
                    strict: Some(false),
                },
            })
            .build()
            .map_err(build_error)?;

        let response = self.chat(request).await?;
        parse_json_payload(&first_text(&response)?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
