//! `SubprocessExecutor`: delegates a task to an external long-lived
//! process instead of calling a model directly — the path taken for
//! agents tagged with an external framework (`framework: crewai` /
//! `framework: langchain` in an `AgentConfig`, §4.1 step 7). One request,
//! one newline-delimited JSON response per `execute` call; the child is
//! spawned fresh each call rather than kept warm, matching the
//! short-lived-subprocess style `CliExecuteTool` already uses for skill
//! scripts.

use super::{CancellationToken, Executor};
use crate::errors::{Result, RuntimeError};
use crate::types::{Message, Task};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct SubprocessExecutor {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessExecutor {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { command: command.into(), args, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct SubprocessRequest<'a> {
    task_id: &'a str,
    correlation_id: &'a str,
    history: &'a [Message],
}

#[derive(Deserialize)]
struct SubprocessResponse {
    content: String,
    #[serde(default)]
    is_error: bool,
}

#[async_trait]
impl Executor for SubprocessExecutor {
    async fn execute(&self, task: &mut Task, inbound: Message, correlation_id: &str, cancel: CancellationToken) -> Result<Message> {
        task.history.push(inbound);

        let request = SubprocessRequest { task_id: &task.id, correlation_id, history: &task.history };
        let payload = serde_json::to_string(&request)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| RuntimeError::Config("subprocess executor: stdin unavailable".to_string()))?;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        drop(stdin);

        let stdout = child.stdout.take().ok_or_else(|| RuntimeError::Config("subprocess executor: stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let read_response = async {
            loop {
                if cancel.is_cancelled() {
                    return Err(RuntimeError::Canceled);
                }
                match lines.next_line().await? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => return Ok(line),
                    None => return Err(RuntimeError::Config("subprocess executor: process closed stdout without a response".to_string())),
                }
            }
        };

        let outcome = tokio::time::timeout(self.timeout, read_response).await;
        let _ = child.start_kill();

        let line = match outcome {
            Ok(inner) => inner?,
            Err(_) => return Err(RuntimeError::Transient(format!("subprocess executor timed out after {:?}", self.timeout))),
        };

        let parsed: SubprocessResponse = serde_json::from_str(&line)?;
        let message =
            if parsed.is_error { Message::assistant(format!("subprocess executor reported an error: {}", parsed.content)) } else { Message::assistant(parsed.content) };
        task.history.push(message.clone());
        Ok(message)
    }
}
