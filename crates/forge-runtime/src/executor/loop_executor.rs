//! `LoopExecutor`: the built-in tool-using inference loop (§4.2.1).
//!
//! One step is: check the character budget and compact if past the
//! trigger ratio, fire `BeforeLLMCall`, call the model, fire
//! `AfterLLMCall`, and either return the final message or dispatch every
//! requested tool call (firing `BeforeToolExec`/`AfterToolExec` around
//! each) before looping. The loop is capped at `max_steps` (default 25,
//! §4.2.1) and persists the transcript through an optional `SessionStore`
//! after every step that changes it, so a crash mid-loop loses at most the
//! in-flight step.

use super::hooks::{HookContext, HookRegistry};
use super::{CancellationToken, Executor, EventStream, StepEvent};
use crate::errors::{Result, RuntimeError};
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::compactor::Compactor;
use crate::memory::session_store::SessionStore;
use crate::tools::ToolRegistry;
use crate::types::{FinishReason, Message, Task};
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_MAX_STEPS: usize = 25;
const DEFAULT_TRIGGER_RATIO: f64 = 0.8;

pub struct LoopExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    hooks: Arc<HookRegistry>,
    compactor: Option<Arc<Compactor>>,
    sessions: Option<Arc<SessionStore>>,
    system_prompt: String,
    char_budget: usize,
    trigger_ratio: f64,
    max_steps: usize,
}

impl LoopExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, system_prompt: impl Into<String>, char_budget: usize) -> Self {
        Self {
            llm,
            tools,
            hooks: Arc::new(HookRegistry::new()),
            compactor: None,
            sessions: None,
            system_prompt: system_prompt.into(),
            char_budget,
            trigger_ratio: DEFAULT_TRIGGER_RATIO,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_compactor(mut self, compactor: Arc<Compactor>) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_trigger_ratio(mut self, trigger_ratio: f64) -> Self {
        self.trigger_ratio = trigger_ratio;
        self
    }

    fn total_chars(task: &Task) -> usize {
        task.history.iter().map(Message::char_len).sum()
    }

    async fn maybe_compact(&self, task: &mut Task, session_id: Option<&str>) {
        if let Some(compactor) = &self.compactor {
            let threshold = (self.char_budget as f64 * self.trigger_ratio) as usize;
            if Self::total_chars(task) > threshold {
                let transcript = std::mem::take(&mut task.history);
                task.history = compactor.compact(session_id, transcript, self.char_budget).await;
            }
        }
    }

    fn persist(&self, task: &Task) {
        if let Some(sessions) = &self.sessions {
            if let Err(err) = sessions.overwrite(&task.id, &task.history) {
                tracing::warn!(task_id = %task.id, error = %err, "failed to persist session transcript");
            }
        }
    }

    /// Run one request/response/tool-dispatch round. Returns `Some(message)`
    /// when the loop is done (final answer or step limit), `None` to keep
    /// looping.
    async fn step(&self, task: &mut Task, ctx: &HookContext, step_no: usize) -> Result<Option<Message>> {
        self.maybe_compact(task, Some(&task.id.clone())).await;

        self.hooks.dispatch_before_llm_call(ctx).await;
        let request = CompletionRequest { system_prompt: self.system_prompt.clone(), messages: task.history.clone(), tools: self.tools.schemas() };
        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(err) => {
                self.hooks.dispatch_on_error(ctx, &err).await;
                return Err(err);
            }
        };
        self.hooks.dispatch_after_llm_call(ctx).await;

        if let Some(message) = &response.message {
            task.history.push(message.clone());
        }

        let is_final = response.finish_reason != FinishReason::ToolCalls || response.tool_calls.is_empty();
        if is_final {
            let message = response.message.unwrap_or_else(|| Message::assistant(String::new()));
            self.persist(task);
            return Ok(Some(message));
        }

        for call in &response.tool_calls {
            let tool_ctx = ctx.clone().with_tool(call.name.clone(), call.arguments.clone());
            self.hooks.dispatch_before_tool_exec(&tool_ctx).await;
            let result = self.tools.dispatch(call).await;
            let tool_ctx = tool_ctx.with_output(result.content.clone());
            self.hooks.dispatch_after_tool_exec(&tool_ctx).await;
            task.history.push(result);
        }
        self.persist(task);

        if step_no + 1 >= self.max_steps {
            let message = Message::assistant(format!("step limit of {} exceeded", self.max_steps));
            task.history.push(message.clone());
            self.persist(task);
            return Ok(Some(message));
        }

        Ok(None)
    }
}

#[async_trait]
impl Executor for LoopExecutor {
    async fn execute(&self, task: &mut Task, inbound: Message, correlation_id: &str, cancel: CancellationToken) -> Result<Message> {
        task.history.push(inbound);
        let ctx = HookContext::new(task.id.clone(), correlation_id.to_string());

        for step_no in 0..self.max_steps {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Canceled);
            }
            if let Some(message) = self.step(task, &ctx, step_no).await? {
                return Ok(message);
            }
        }

        let message = Message::assistant(format!("step limit of {} exceeded", self.max_steps));
        task.history.push(message.clone());
        Ok(message)
    }

    fn execute_stream(self: Arc<Self>, mut task: Task, inbound: Message, correlation_id: String, cancel: CancellationToken) -> EventStream {
        Box::pin(async_stream::stream! {
            task.history.push(inbound);
            let ctx = HookContext::new(task.id.clone(), correlation_id);

            for step_no in 0..self.max_steps {
                if cancel.is_cancelled() {
                    yield StepEvent::Final(Message::assistant("task canceled"));
                    return;
                }
                let before = task.history.len();
                match self.step(&mut task, &ctx, step_no).await {
                    Ok(Some(message)) => {
                        for msg in &task.history[before..] {
                            if msg.tool_call_id.is_some() {
                                yield StepEvent::Tool(msg.clone());
                            }
                        }
                        yield StepEvent::Final(message);
                        return;
                    }
                    Ok(None) => {
                        for msg in &task.history[before..] {
                            if msg.tool_call_id.is_some() {
                                yield StepEvent::Tool(msg.clone());
                            }
                        }
                    }
                    Err(err) => {
                        yield StepEvent::Final(Message::assistant(format!("execution failed: {err}")));
                        return;
                    }
                }
            }
            yield StepEvent::Final(Message::assistant(format!("step limit of {} exceeded", self.max_steps)));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionResponse, TokenUsage, ToolCallRequest};
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<CompletionResponse>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted llm ran out of responses");
            }
            Ok(responses.remove(0))
        }

        fn identity(&self) -> String {
            "scripted:v1".to_string()
        }
    }

    fn final_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            finish_reason: FinishReason::Stop,
            message: Some(Message::assistant(text)),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    fn tool_call_response(tool: &str) -> CompletionResponse {
        let call = ToolCallRequest { id: "c1".into(), name: tool.into(), arguments: json!({}) };
        CompletionResponse {
            finish_reason: FinishReason::ToolCalls,
            message: Some(Message::assistant("")),
            tool_calls: vec![call],
            usage: TokenUsage::default(),
        }
    }

    struct EchoTool;

    #[async_trait]
    impl crate::tools::Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: serde_json::Value) -> Result<String> {
            Ok("echoed".to_string())
        }
    }

    #[tokio::test]
    async fn stops_immediately_on_a_finish_reason_of_stop() {
        let llm = Arc::new(ScriptedLlm { responses: Mutex::new(vec![final_response("done")]) });
        let executor = LoopExecutor::new(llm, Arc::new(ToolRegistry::new()), "system", 10_000);
        let mut task = Task::new("t1", Message::user("placeholder"));
        task.history.clear();
        let result = executor.execute(&mut task, Message::user("hi"), "corr-1", CancellationToken::new()).await.unwrap();
        assert_eq!(result.content, "done");
    }

    #[tokio::test]
    async fn dispatches_a_tool_call_then_returns_the_final_message() {
        let llm = Arc::new(ScriptedLlm { responses: Mutex::new(vec![tool_call_response("echo"), final_response("done")]) });
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let executor = LoopExecutor::new(llm, Arc::new(registry), "system", 10_000);
        let mut task = Task::new("t1", Message::user("placeholder"));
        task.history.clear();
        let result = executor.execute(&mut task, Message::user("hi"), "corr-1", CancellationToken::new()).await.unwrap();
        assert_eq!(result.content, "done");
        assert!(task.history.iter().any(|m| m.content == "echoed"));
    }

    #[tokio::test]
    async fn step_limit_terminates_a_runaway_tool_loop() {
        let responses: Vec<CompletionResponse> = (0..30).map(|_| tool_call_response("echo")).collect();
        let llm = Arc::new(ScriptedLlm { responses: Mutex::new(responses) });
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let executor = LoopExecutor::new(llm, Arc::new(registry), "system", 10_000).with_max_steps(3);
        let mut task = Task::new("t1", Message::user("placeholder"));
        task.history.clear();
        let result = executor.execute(&mut task, Message::user("hi"), "corr-1", CancellationToken::new()).await.unwrap();
        assert!(result.content.contains("step limit"));
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_the_next_step() {
        let llm = Arc::new(ScriptedLlm { responses: Mutex::new(vec![final_response("unreachable")]) });
        let executor = LoopExecutor::new(llm, Arc::new(ToolRegistry::new()), "system", 10_000);
        let mut task = Task::new("t1", Message::user("placeholder"));
        task.history.clear();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor.execute(&mut task, Message::user("hi"), "corr-1", cancel).await;
        assert!(matches!(result, Err(RuntimeError::Canceled)));
    }

    #[tokio::test]
    async fn execute_stream_yields_tool_events_then_a_final_event() {
        let llm = Arc::new(ScriptedLlm { responses: Mutex::new(vec![tool_call_response("echo"), final_response("done")]) });
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let executor = Arc::new(LoopExecutor::new(llm, Arc::new(registry), "system", 10_000));
        let mut task = Task::new("t1", Message::user("placeholder"));
        task.history.clear();
        let mut stream = executor.execute_stream(task, Message::user("hi"), "corr-1".to_string(), CancellationToken::new());
        let mut tool_events = 0;
        let mut final_seen = false;
        while let Some(event) = stream.next().await {
            match event {
                StepEvent::Tool(_) => tool_events += 1,
                StepEvent::Final(message) => {
                    assert_eq!(message.content, "done");
                    final_seen = true;
                }
            }
        }
        assert_eq!(tool_events, 1);
        assert!(final_seen);
    }
}
