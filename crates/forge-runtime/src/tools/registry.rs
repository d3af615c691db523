//! The `Tool` trait and the registry the executor dispatches calls through.

use crate::errors::Result;
use crate::llm::ToolSchema;
use crate::types::{Message, ToolCallRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// An invocable function exposed to the model, identified by name and
/// described by a JSON-schema `parameters` document.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    /// Bounded timeout applied by the registry around `call` — the skill
    /// timeout hint where one is known, or the §5 defaults (30s built-in,
    /// 120s skill scripts) otherwise.
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn call(&self, arguments: Value) -> Result<String>;
}

/// Name-keyed tool registry. Construction happens once at runner startup
/// (§4.1 step 8); lookups during the loop are immutable reads.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas submitted to the LLM client alongside the transcript.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema { name: t.name().to_string(), description: t.description().to_string(), parameters: t.parameters_schema() })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a tool call with a bounded timeout, catching panics at the
    /// boundary (§7: "Panics from any extension point ... are caught at the
    /// loop boundary"). Never returns `Err` — tool failures become an
    /// error-marked `tool_result` Message so the model gets another turn.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Message {
        let Some(tool) = self.get(&call.name) else {
            return Message::tool_result(call.id.clone(), format!("tool '{}' not found in registry", call.name), true);
        };

        let arguments = call.arguments.clone();
        let fut = AssertUnwindSafe(tool.call(arguments));
        let guarded = futures::FutureExt::catch_unwind(fut);

        match tokio::time::timeout(tool.timeout(), guarded).await {
            Ok(Ok(Ok(output))) => Message::tool_result(call.id.clone(), output, false),
            Ok(Ok(Err(err))) => Message::tool_result(call.id.clone(), err.to_string(), true),
            Ok(Err(panic)) => {
                let detail = panic_message(&panic);
                tracing::warn!(tool = %call.name, panic = %detail, "tool panicked");
                Message::tool_result(call.id.clone(), format!("tool '{}' panicked: {detail}", call.name), true)
            }
            Err(_) => Message::tool_result(call.id.clone(), format!("tool '{}' timed out after {:?}", call.name, tool.timeout()), true),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, arguments: Value) -> Result<String> {
            Ok(arguments.to_string())
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> Result<String> {
            panic!("kaboom");
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never returns in time"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
        async fn call(&self, _arguments: Value) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest { id: "c1".into(), name: name.into(), arguments: json!({"x": 1}) }
    }

    #[tokio::test]
    async fn dispatches_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let msg = registry.dispatch(&call("echo")).await;
        assert_eq!(msg.is_error, Some(false));
    }

    #[tokio::test]
    async fn missing_tool_is_a_tool_error_not_a_panic() {
        let registry = ToolRegistry::new();
        let msg = registry.dispatch(&call("missing")).await;
        assert_eq!(msg.is_error, Some(true));
        assert!(msg.content.contains("not found"));
    }

    #[tokio::test]
    async fn panicking_tool_is_captured_as_tool_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanickingTool));
        let msg = registry.dispatch(&call("boom")).await;
        assert_eq!(msg.is_error, Some(true));
        assert!(msg.content.contains("panicked"));
    }

    #[tokio::test]
    async fn timeout_is_captured_as_tool_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool));
        let msg = registry.dispatch(&call("slow")).await;
        assert_eq!(msg.is_error, Some(true));
        assert!(msg.content.contains("timed out"));
    }
}
