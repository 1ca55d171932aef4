//! Tool registry for managing available tools

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::ai::types::AiTool;
use crate::calendar::CalendarBackend;
use crate::constants::calendar::TOOL_TIMEOUT;
use crate::time::Clock;
use crate::tools::normalize::normalize_arguments;

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a structured success envelope with `ok=true` and `data`.
    pub fn success_data(data: Value) -> Self {
        Self::success_data_with(data, Vec::new())
    }

    /// Success envelope carrying warnings about coerced input.
    pub fn success_data_with(data: Value, warnings: Vec<String>) -> Self {
        let mut envelope = serde_json::Map::new();
        envelope.insert("ok".to_string(), Value::Bool(true));
        envelope.insert("data".to_string(), data);

        if !warnings.is_empty() {
            envelope.insert(
                "warnings".to_string(),
                Value::Array(warnings.into_iter().map(Value::String).collect()),
            );
        }

        Self {
            output: Value::Object(envelope).to_string(),
            is_error: false,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        let envelope = serde_json::json!({
            "ok": false,
            "error": {
                "code": code,
                "message": msg.to_string()
            }
        });
        Self {
            output: envelope.to_string(),
            is_error: true,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    /// `data` of a success envelope, if this is one
    pub fn data(&self) -> Option<Value> {
        if self.is_error {
            return None;
        }
        serde_json::from_str::<Value>(&self.output)
            .ok()
            .filter(|v| v["ok"] == Value::Bool(true))
            .map(|mut v| v["data"].take())
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
///
/// Arguments are normalized first, so JSON text and fenced JSON are accepted.
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(normalize_arguments(params))
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

/// Context for tool execution
#[derive(Clone)]
pub struct ToolContext {
    pub calendar: Arc<dyn CalendarBackend>,
    /// Supplies "now" and the user's timezone for coercing naive times
    pub clock: Clock,
}

impl ToolContext {
    pub fn new(calendar: Arc<dyn CalendarBackend>, clock: Clock) -> Self {
        Self { calendar, clock }
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for AI
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry for managing tools
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    /// Default timeout for tool execution
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            default_timeout: TOOL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        tools.insert(name, tool);
    }

    /// Get a tool by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Tool definitions for the named tools, in the order given.
    /// Unregistered names are skipped.
    pub async fn ai_tools(&self, names: &[&str]) -> Vec<AiTool> {
        let tools = self.tools.read().await;
        names
            .iter()
            .filter_map(|name| tools.get(*name))
            .map(|t| AiTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect()
    }

    /// Execute a tool by name with timeout
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
    ) -> Option<ToolResult> {
        let tool = self.get(name).await?;
        let timeout = self.default_timeout;
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error_with_code(
                    "timeout",
                    format!(
                        "Tool '{}' timed out after {} seconds",
                        name,
                        timeout.as_secs()
                    ),
                )
            }
        };

        tracing::info!(
            tool = name,
            is_error = result.is_error,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::InMemoryCalendar;
    use serde_json::json;

    fn create_test_context() -> ToolContext {
        ToolContext::new(
            Arc::new(InMemoryCalendar::new(chrono_tz::UTC)),
            Clock::new(chrono_tz::UTC),
        )
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::success_data(params)
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ToolResult::success("late")
        }
    }

    #[tokio::test]
    async fn test_tool_registry_nonexistent_tool() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("nonexistent_tool", json!({}), &create_test_context())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_timeout_becomes_inline_error() {
        let registry = ToolRegistry::new().with_default_timeout(Duration::from_millis(20));
        registry.register(Arc::new(SlowTool)).await;

        let result = registry
            .execute("slow", json!({}), &create_test_context())
            .await
            .unwrap();
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["error"]["code"], "timeout");
    }

    #[tokio::test]
    async fn test_ai_tools_follow_requested_order() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        registry.register(Arc::new(SlowTool)).await;

        let tools = registry.ai_tools(&["slow", "missing", "echo"]).await;
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "echo"]);
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error_with_code("not_found", "Event not found: abc");
        assert!(result.is_error);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["error"]["code"], "not_found");
        assert_eq!(parsed["error"]["message"], "Event not found: abc");
    }

    #[test]
    fn test_success_data_envelope() {
        let result = ToolResult::success_data_with(json!([1, 2]), vec!["coerced".into()]);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["ok"], true);
        assert_eq!(parsed["warnings"][0], "coerced");
        assert_eq!(result.data(), Some(json!([1, 2])));
        assert_eq!(ToolResult::invalid_parameters("x").data(), None);
    }

    #[test]
    fn test_parse_params_accepts_fenced_json_text() {
        #[derive(serde::Deserialize)]
        struct Params {
            name: String,
        }

        let parsed: Params =
            parse_params(json!("```json\n{\"name\": \"lunch\"}\n```")).unwrap();
        assert_eq!(parsed.name, "lunch");

        let err = parse_params::<Params>(json!({"name": 3})).err().unwrap();
        let parsed: Value = serde_json::from_str(&err.output).unwrap();
        assert_eq!(parsed["error"]["code"], "invalid_parameters");
    }
}
