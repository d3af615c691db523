//! `MockExecutor`: a deterministic stand-in for the LLM-backed loop, used
//! by acceptance tests and by `forge run --mock` (§8: tests must not
//! depend on a live model). It never calls a model; it answers
//! deterministically from the registered tool names so the same inbound
//! message always produces the same transcript.

use super::{CancellationToken, Executor};
use crate::errors::Result;
use crate::tools::ToolRegistry;
use crate::types::{Message, Task};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MockExecutor {
    tools: Arc<ToolRegistry>,
}

impl MockExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    fn deterministic_reply(&self, inbound: &Message) -> String {
        let mut names: Vec<String> = self.tools.schemas().into_iter().map(|s| s.name).collect();
        names.sort();
        if names.is_empty() {
            format!("mock response to: {}", inbound.content)
        } else {
            format!("mock response to: {} (tools available: {})", inbound.content, names.join(", "))
        }
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, task: &mut Task, inbound: Message, _correlation_id: &str, _cancel: CancellationToken) -> Result<Message> {
        let reply = self.deterministic_reply(&inbound);
        task.history.push(inbound);
        let message = Message::assistant(reply);
        task.history.push(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_inbound_produces_the_same_reply() {
        let executor = MockExecutor::new(Arc::new(ToolRegistry::new()));
        let mut task_a = Task::new("a", Message::user("placeholder"));
        task_a.history.clear();
        let mut task_b = Task::new("b", Message::user("placeholder"));
        task_b.history.clear();
        let reply_a = executor.execute(&mut task_a, Message::user("hello"), "c1", CancellationToken::new()).await.unwrap();
        let reply_b = executor.execute(&mut task_b, Message::user("hello"), "c2", CancellationToken::new()).await.unwrap();
        assert_eq!(reply_a.content, reply_b.content);
    }

    #[tokio::test]
    async fn never_calls_out_to_anything_external() {
        let executor = MockExecutor::new(Arc::new(ToolRegistry::new()));
        let mut task = Task::new("a", Message::user("placeholder"));
        task.history.clear();
        let reply = executor.execute(&mut task, Message::user("hi"), "c1", CancellationToken::new()).await.unwrap();
        assert!(reply.content.starts_with("mock response to:"));
    }
}
