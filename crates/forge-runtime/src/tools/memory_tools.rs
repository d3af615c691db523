//! `memory-search`/`memory-get`: the model-facing surface of long-term
//! memory (§4.1 step 11, §4.3).

use crate::errors::{Result, RuntimeError};
use crate::memory::long_term::LongTermMemory;
use crate::tools::registry::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct MemorySearchTool {
    memory: Arc<LongTermMemory>,
}

impl MemorySearchTool {
    pub fn new(memory: Arc<LongTermMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory-search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for snippets relevant to a query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "top_k": {"type": "integer", "minimum": 1},
            },
            "required": ["query"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| RuntimeError::ToolError { name: "memory-search".into(), message: "missing 'query' argument".into() })?;
        let top_k = arguments.get("top_k").and_then(Value::as_u64).unwrap_or(5) as usize;

        let results = self.memory.search(query, top_k);
        let payload: Vec<Value> = results
            .into_iter()
            .map(|scored| json!({"id": scored.snippet.id, "text": scored.snippet.text, "score": scored.score}))
            .collect();
        Ok(serde_json::to_string(&payload)?)
    }
}

pub struct MemoryGetTool {
    memory: Arc<LongTermMemory>,
}

impl MemoryGetTool {
    pub fn new(memory: Arc<LongTermMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for MemoryGetTool {
    fn name(&self) -> &str {
        "memory-get"
    }

    fn description(&self) -> &str {
        "Fetch a single long-term memory snippet by id."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]})
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let id = arguments
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RuntimeError::ToolError { name: "memory-get".into(), message: "missing 'id' argument".into() })?;

        match self.memory.get(id) {
            Some(snippet) => Ok(serde_json::to_string(&json!({"id": snippet.id, "text": snippet.text}))?),
            None => Err(RuntimeError::ToolError { name: "memory-get".into(), message: format!("no snippet with id '{id}'") }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_matching_snippets_as_json() {
        let memory = Arc::new(LongTermMemory::new(None, 30.0));
        memory.flush("s1", "the deployment uses kubernetes and rust");
        let tool = MemorySearchTool::new(memory);
        let output = tool.call(json!({"query": "kubernetes"})).await.unwrap();
        assert!(output.contains("s1"));
    }

    #[tokio::test]
    async fn get_returns_error_for_missing_id() {
        let memory = Arc::new(LongTermMemory::new(None, 30.0));
        let tool = MemoryGetTool::new(memory);
        let err = tool.call(json!({"id": "missing"})).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ToolError { .. }));
    }
}
