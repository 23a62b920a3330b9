//! Component B — the Tool Registry: a named, schema-validated mapping from
//! tool name to executor. Dynamic dispatch by name, not reflection (spec
//! §9): every executor shares one tagged-union input (`serde_json::Value`)
//! and output ([`ToolOutcome`]).

use super::schema::ToolSchema;
use crate::error::ErrorCode;
use crate::types::ToolResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// What an executor hands back: either a structured success payload or a
/// classified failure message. Never panics — `execute` converts thrown
/// errors into this shape (spec §4.B).
pub enum ToolOutcome {
    Success(serde_json::Value),
    Failure { message: String, classification: ErrorCode },
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: serde_json::Value) -> ToolOutcome;
}

pub struct RegisteredTool {
    pub description: String,
    pub parameter_schema: ToolSchema,
    pub executor: Arc<dyn ToolExecutor>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: ToolSchema,
        executor: Arc<dyn ToolExecutor>,
    ) {
        self.tools.insert(
            name.into(),
            RegisteredTool {
                description: description.into(),
                parameter_schema,
                executor,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|s| s.as_str())
    }

    pub fn adverts(&self) -> Vec<crate::llm::ToolAdvert> {
        self.tools
            .iter()
            .map(|(name, t)| crate::llm::ToolAdvert {
                name: name.clone(),
                description: t.description.clone(),
                schema: t.parameter_schema.clone(),
            })
            .collect()
    }

    /// Execute a named tool with already-normalized arguments. Unknown
    /// names yield `UnknownTool` without invoking anything; schema
    /// validation failures and executor failures both become a
    /// `success=false` [`ToolResult`] — execution never panics the caller.
    pub async fn execute(&self, name: &str, tool_call_id: &str, args: serde_json::Value) -> ToolResult {
        let started = Instant::now();
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(
                name,
                tool_call_id,
                format!("unknown tool '{name}'"),
                ErrorCode::UnknownTool,
                started.elapsed().as_millis() as u64,
            );
        };

        if let Err(e) = tool.parameter_schema.validate(&args) {
            return ToolResult::err(
                name,
                tool_call_id,
                e.to_string(),
                ErrorCode::ValidationError,
                started.elapsed().as_millis() as u64,
            );
        }

        match tool.executor.execute(args).await {
            ToolOutcome::Success(value) => {
                ToolResult::ok(name, tool_call_id, value, started.elapsed().as_millis() as u64)
            }
            ToolOutcome::Failure {
                message,
                classification,
            } => ToolResult::err(
                name,
                tool_call_id,
                message,
                classification,
                started.elapsed().as_millis() as u64,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
            ToolOutcome::Success(args)
        }
    }

    struct AlwaysFailsTool;

    #[async_trait]
    impl ToolExecutor for AlwaysFailsTool {
        async fn execute(&self, _args: serde_json::Value) -> ToolOutcome {
            ToolOutcome::Failure {
                message: "upstream unavailable".into(),
                classification: ErrorCode::ToolError,
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_invoke_anything() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", "c1", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error_classification, Some(ErrorCode::UnknownTool));
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "echo",
            "echoes input",
            ToolSchema::new().required_string("msg"),
            Arc::new(EchoTool),
        );
        let result = registry
            .execute("echo", "c1", json!({"msg": "hi"}))
            .await;
        assert!(result.success);
        assert_eq!(result.result, Some(json!({"msg": "hi"})));
    }

    #[tokio::test]
    async fn test_schema_validation_failure_does_not_invoke_executor() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "echo",
            "echoes input",
            ToolSchema::new().required_string("msg"),
            Arc::new(EchoTool),
        );
        let result = registry.execute("echo", "c1", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error_classification, Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn test_executor_failure_is_captured_not_propagated() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "flaky",
            "always fails",
            ToolSchema::new(),
            Arc::new(AlwaysFailsTool),
        );
        let result = registry.execute("flaky", "c1", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("upstream unavailable"));
    }
}
