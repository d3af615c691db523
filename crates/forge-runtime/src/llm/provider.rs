//! The `LlmClient` trait every provider adapter and the `FallbackChain`
//! implement.

use crate::errors::Result;
use crate::types::{CompletionResponse, Message};
use async_trait::async_trait;
use serde_json::Value;

/// A tool's name and JSON-schema description, submitted alongside the
/// transcript so the model knows what it may call.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// `provider:model`, used in error messages and audit entries.
    fn identity(&self) -> String;
}
