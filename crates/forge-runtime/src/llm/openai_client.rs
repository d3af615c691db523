//! An OpenAI-compatible chat-completions adapter (also serves self-hosted
//! and Ollama endpoints that speak the same `/chat/completions` wire
//! format). Built directly on `reqwest`, the same HTTP client the egress
//! enforcer wraps for tool I/O, rather than pulling in the `async-openai`
//! SDK's typed request/response shapes for what is, at this layer, a single
//! JSON round-trip.

use crate::errors::{Result, RuntimeError};
use crate::llm::provider::{CompletionRequest, LlmClient};
use crate::types::{CompletionResponse, FinishReason, Message, Role, ToolCallRequest, TokenUsage};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    provider: String,
}

impl OpenAiClient {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model: model.into(),
            provider: provider.into(),
        }
    }

    fn to_wire_message(message: &Message) -> Value {
        match message.role {
            Role::System => json!({"role": "system", "content": message.content}),
            Role::User => json!({"role": "user", "content": message.content}),
            Role::Agent => {
                if message.tool_calls.is_empty() {
                    json!({"role": "assistant", "content": message.content})
                } else {
                    json!({
                        "role": "assistant",
                        "content": message.content,
                        "tool_calls": message.tool_calls.iter().map(|c| json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments.to_string()},
                        })).collect::<Vec<_>>(),
                    })
                }
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
        }
    }

    fn classify_http_error(status: reqwest::StatusCode, body: &str) -> RuntimeError {
        match status.as_u16() {
            401 | 403 => RuntimeError::Authentication(body.to_string()),
            400 | 404 | 422 => RuntimeError::InvalidRequest(body.to_string()),
            429 => RuntimeError::Transient(format!("rate limited: {body}")),
            500..=599 => RuntimeError::Transient(body.to_string()),
            _ => RuntimeError::Transient(body.to_string()),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut messages = vec![json!({"role": "system", "content": request.system_prompt})];
        messages.extend(request.messages.iter().map(Self::to_wire_message));

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| json!({"type": "function", "function": {"name": t.name, "description": t.description, "parameters": t.parameters}}))
            .collect();

        let mut body = json!({"model": self.model, "messages": messages});
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let mut req = self.http.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| RuntimeError::Transient(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| RuntimeError::Transient(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::classify_http_error(status, &text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| RuntimeError::InvalidRequest(format!("malformed provider response: {e}")))?;
        parse_completion(&parsed)
    }

    fn identity(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

fn parse_completion(body: &Value) -> Result<CompletionResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| RuntimeError::InvalidRequest("provider response had no choices".into()))?;

    let finish_reason = match choice.get("finish_reason").and_then(Value::as_str) {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    let message_body = choice.get("message");
    let content = message_body.and_then(|m| m.get("content")).and_then(Value::as_str).unwrap_or_default();

    let tool_calls: Vec<ToolCallRequest> = message_body
        .and_then(|m| m.get("tool_calls"))
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let id = call.get("id")?.as_str()?.to_string();
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments_str = function.get("arguments")?.as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(arguments_str).unwrap_or(json!({}));
                    Some(ToolCallRequest { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = body
        .get("usage")
        .map(|u| TokenUsage {
            prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            completion_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
        })
        .unwrap_or_default();

    let message = if content.is_empty() && tool_calls.is_empty() {
        None
    } else {
        let mut msg = Message::assistant(content);
        msg.tool_calls = tool_calls.clone();
        Some(msg)
    };

    Ok(CompletionResponse { finish_reason, message, tool_calls, usage })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_stop_completion() {
        let body = json!({
            "choices": [{"finish_reason": "stop", "message": {"role": "assistant", "content": "hi there"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13},
        });
        let response = parse_completion(&body).unwrap();
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.message.unwrap().content, "hi there");
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[test]
    fn parses_tool_call_completion() {
        let body = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}}]
                }
            }]
        });
        let response = parse_completion(&body).unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "search");
    }

    #[test]
    fn classifies_authentication_errors_as_non_retriable() {
        let err = OpenAiClient::classify_http_error(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, RuntimeError::Authentication(_)));
    }

    #[test]
    fn classifies_rate_limit_as_transient() {
        let err = OpenAiClient::classify_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, RuntimeError::Transient(_)));
    }
}
