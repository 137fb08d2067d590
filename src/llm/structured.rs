//! Typed structured output on top of [`LLMClient::generate_structured`].

use crate::llm::client::LLMClient;
use crate::types::DecisionError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Ask the model for a value of type `T`, constrained by `T`'s JSON schema.
///
/// Output that does not deserialize into `T` is an `InvalidOutput` decision error.
/// There are no retries.
pub async fn generate_typed<T>(
    client: &dyn LLMClient,
    system: &str,
    prompt: &str,
) -> Result<T, DecisionError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| DecisionError::InvalidOutput(format!("schema generation failed: {}", e)))?;
    let name = T::schema_name();

    let value = client
        .generate_structured(system, prompt, &name, &schema)
        .await?;

    serde_json::from_value(value).map_err(|e| {
        DecisionError::InvalidOutput(format!("response does not match {}: {}", name, e))
    })
}

/// Parse a model reply as JSON, tolerating a surrounding markdown code fence.
pub fn parse_json_payload(text: &str) -> Result<Value, DecisionError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if body.is_empty() {
        return Err(DecisionError::InvalidOutput(
            "empty structured response".to_string(),
        ));
    }

    serde_json::from_str(body)
        .map_err(|e| DecisionError::InvalidOutput(format!("response is not valid JSON: {}", e)))
}
