//! The tool-using inference loop (§4.2): an `Executor` trait with three
//! implementations (`LoopExecutor` for direct LLM-backed agents,
//! `MockExecutor` for deterministic tests, `SubprocessExecutor` for
//! framework-tagged agents that delegate to an external process), a
//! `HookRegistry` dispatching the five lifecycle hooks in registration
//! order, and a dependency-free `CancellationToken`.
//!
//! Grounded in the teacher's (now-removed) `engine`/`instance` step loop
//! shape — request, inspect finish reason, either return or dispatch tool
//! calls and loop — generalized from a single-guest WASM call into a
//! provider-agnostic chat loop.

pub mod hooks;
pub mod loop_executor;
pub mod mock;
pub mod subprocess;

pub use hooks::{Hook, HookContext, HookRegistry};
pub use loop_executor::LoopExecutor;
pub use mock::MockExecutor;
pub use subprocess::SubprocessExecutor;

use crate::errors::Result;
use crate::types::{Message, Task};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag checked between loop steps and before
/// each tool dispatch. No external crate needed: `forge-runtime` does not
/// depend on `tokio-util`, so this is a minimal `Arc<AtomicBool>` wrapper
/// rather than `tokio_util::sync::CancellationToken`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An event in the step loop, yielded by `execute_stream` for
/// `tasks/sendSubscribe` consumers.
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// A tool call was dispatched; carries the resulting tool-result message.
    Tool(Message),
    /// The loop produced its final assistant message.
    Final(Message),
}

pub type EventStream = BoxStream<'static, StepEvent>;

/// Drives a task's transcript forward in response to one inbound message.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run to completion (final assistant message or step-limit/error
    /// message), mutating `task.history` in place.
    async fn execute(&self, task: &mut Task, inbound: Message, correlation_id: &str, cancel: CancellationToken) -> Result<Message>;

    /// Same semantics as `execute`, but yields intermediate tool-result
    /// messages as they occur. The default implementation runs `execute`
    /// and yields a single `Final` event; `LoopExecutor` overrides this to
    /// stream genuinely.
    fn execute_stream(self: Arc<Self>, mut task: Task, inbound: Message, correlation_id: String, cancel: CancellationToken) -> EventStream
    where
        Self: 'static,
    {
        Box::pin(async_stream::stream! {
            match self.execute(&mut task, inbound, &correlation_id, cancel).await {
                Ok(message) => yield StepEvent::Final(message),
                Err(err) => yield StepEvent::Final(Message::assistant(format!("execution failed: {err}"))),
            }
        })
    }
}
