//! Lifecycle hooks (§4.2.2): `BeforeLLMCall`, `AfterLLMCall`,
//! `BeforeToolExec`, `AfterToolExec`, `OnError`, dispatched sequentially in
//! registration order. A hook that returns an error is logged and does not
//! abort the step loop — hooks observe and may annotate, they do not gate.

use crate::errors::RuntimeError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// What a hook callback can see at the point it fires. Fields unrelated to
/// the current event (e.g. `tool_name` outside a tool-exec hook) are `None`.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub task_id: String,
    pub correlation_id: String,
    pub tool_name: Option<String>,
    pub tool_args: Option<Value>,
    pub tool_output: Option<String>,
}

impl HookContext {
    pub fn new(task_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self { task_id: task_id.into(), correlation_id: correlation_id.into(), tool_name: None, tool_args: None, tool_output: None }
    }

    pub fn with_tool(mut self, name: impl Into<String>, args: Value) -> Self {
        self.tool_name = Some(name.into());
        self.tool_args = Some(args);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.tool_output = Some(output.into());
        self
    }
}

#[async_trait]
pub trait Hook: Send + Sync {
    async fn before_llm_call(&self, _ctx: &HookContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn after_llm_call(&self, _ctx: &HookContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn before_tool_exec(&self, _ctx: &HookContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn after_tool_exec(&self, _ctx: &HookContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn on_error(&self, _ctx: &HookContext, _err: &RuntimeError) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn dispatch_before_llm_call(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            if let Err(err) = hook.before_llm_call(ctx).await {
                tracing::warn!(task_id = %ctx.task_id, error = %err, "before_llm_call hook failed");
            }
        }
    }

    pub async fn dispatch_after_llm_call(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            if let Err(err) = hook.after_llm_call(ctx).await {
                tracing::warn!(task_id = %ctx.task_id, error = %err, "after_llm_call hook failed");
            }
        }
    }

    pub async fn dispatch_before_tool_exec(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            if let Err(err) = hook.before_tool_exec(ctx).await {
                tracing::warn!(task_id = %ctx.task_id, tool = ?ctx.tool_name, error = %err, "before_tool_exec hook failed");
            }
        }
    }

    pub async fn dispatch_after_tool_exec(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            if let Err(err) = hook.after_tool_exec(ctx).await {
                tracing::warn!(task_id = %ctx.task_id, tool = ?ctx.tool_name, error = %err, "after_tool_exec hook failed");
            }
        }
    }

    pub async fn dispatch_on_error(&self, ctx: &HookContext, err: &RuntimeError) {
        for hook in &self.hooks {
            if let Err(hook_err) = hook.on_error(ctx, err).await {
                tracing::warn!(task_id = %ctx.task_id, error = %hook_err, "on_error hook itself failed");
            }
        }
    }
}
