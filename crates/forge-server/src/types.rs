//! JSON-RPC envelope types (§4.5, §6): request/response framing, the
//! streaming SSE event envelope, and the standard + application-specific
//! error codes.

use forge_runtime::Task;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

/// A single JSON-RPC 2.0 response. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    pub fn err(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0", result: None, error: Some(error), id }
    }
}

/// JSON-RPC error object. Standard codes follow the spec; application
/// codes (guardrail violation, egress block) are allocated in the
/// server-error range reserved by the JSON-RPC spec (-32000 to -32099).
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const GUARDRAIL_VIOLATION: i32 = -32000;
    pub const EGRESS_BLOCKED: i32 = -32001;
    pub const TASK_NOT_FOUND: i32 = -32002;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    pub fn guardrail_violation(message: impl Into<String>) -> Self {
        Self::new(Self::GUARDRAIL_VIOLATION, message)
    }

    pub fn egress_blocked(message: impl Into<String>) -> Self {
        Self::new(Self::EGRESS_BLOCKED, message)
    }

    pub fn task_not_found(id: &str) -> Self {
        Self::new(Self::TASK_NOT_FOUND, format!("task not found: {id}"))
    }
}

/// Params for `tasks/send` and `tasks/sendSubscribe`: client-supplied task
/// id (§3: "Task id supplied by client") plus the inbound user message text.
#[derive(Debug, Clone, Deserialize)]
pub struct SendParams {
    pub id: String,
    pub message: String,
}

/// Params for `tasks/get` and `tasks/cancel`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskIdParams {
    pub id: String,
}

/// One framed event on a `tasks/sendSubscribe` stream: `{event, data}`.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    pub event: &'static str,
    pub data: Value,
}

impl StreamEvent {
    pub fn status(task: &Task) -> Self {
        Self { event: "status", data: serde_json::json!({ "id": task.id, "state": task.state }) }
    }

    pub fn tool(message: &forge_runtime::Message) -> Self {
        Self { event: "tool", data: serde_json::to_value(message).expect("Message serialization is infallible") }
    }

    pub fn result(task: &Task) -> Self {
        Self { event: "result", data: serde_json::to_value(task).expect("Task serialization is infallible") }
    }
}

/// The metadata publication document served at `GET /.well-known/agent.json`.
pub use forge_runtime::AgentCard;

/// `GET /healthz` response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_response_ok_carries_no_error() {
        let resp = RpcResponse::ok(Value::from(1), serde_json::json!({"a": 1}));
        assert!(resp.error.is_none());
        assert!(resp.result.is_some());
    }

    #[test]
    fn rpc_error_codes_are_distinct() {
        let codes = [
            RpcError::PARSE_ERROR,
            RpcError::INVALID_REQUEST,
            RpcError::METHOD_NOT_FOUND,
            RpcError::INVALID_PARAMS,
            RpcError::INTERNAL_ERROR,
            RpcError::GUARDRAIL_VIOLATION,
            RpcError::EGRESS_BLOCKED,
            RpcError::TASK_NOT_FOUND,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
