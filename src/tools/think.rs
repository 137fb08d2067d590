use crate::tools::registry::{Tool, ToolContext};
use crate::types::ToolError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Record-and-echo reflection tool. No side effects beyond the transcript.
pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Pause to reflect on progress: what was found, what is missing, and whether to search more or stop."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reflection": {
                    "type": "string",
                    "description": "Your reflection on the research so far"
                }
            },
            "required": ["reflection"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let reflection = args
            .get("reflection")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "think".to_string(),
                message: "missing 'reflection'".to_string(),
            })?;
        Ok(format!("Reflection recorded: {}", reflection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_think_echoes() {
        let out = ThinkTool
            .execute(json!({"reflection": "need pricing data"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out, "Reflection recorded: need pricing data");
    }

    #[tokio::test]
    async fn test_think_requires_reflection() {
        let err = ThinkTool
            .execute(json!({"note": "x"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
