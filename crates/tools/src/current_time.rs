//! Current time tool: reports the local wall-clock time.

use async_trait::async_trait;
use chrono::Local;
use fnagent_core::error::ToolError;
use fnagent_core::tool::{Tool, ToolArgs};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time."
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "type": "object", "properties": {} }))
    }

    fn responses_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "current_time": {
                    "type": "string",
                    "description": "The current time, formatted as YYYY-MM-DD HH:MM:SS"
                }
            }
        }))
    }

    async fn call(&self, _arguments: ToolArgs) -> Result<serde_json::Value, ToolError> {
        let now = Local::now().format(TIME_FORMAT).to_string();
        Ok(serde_json::json!({ "current_time": now }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_parseable_time() {
        let result = CurrentTimeTool.call(ToolArgs::new()).await.unwrap();
        let text = result["current_time"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(text, TIME_FORMAT).is_ok());
    }
}
