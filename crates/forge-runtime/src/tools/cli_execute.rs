//! `cli-execute`: runs a host binary with a filtered environment (§1
//! Non-goals: "scripts are executed in the host process with a filtered
//! environment but no kernel-level isolation").
//!
//! When the agent configuration doesn't declare this tool explicitly, the
//! runner auto-derives `allowed_bins`/`env_passthrough` from the aggregated
//! skill requirements (§4.1 step 8).

use crate::errors::{Result, RuntimeError};
use crate::tools::registry::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;

pub struct CliExecuteTool {
    allowed_bins: Vec<String>,
    env_passthrough: Vec<String>,
    timeout: Duration,
}

impl CliExecuteTool {
    pub fn new(allowed_bins: Vec<String>, env_passthrough: Vec<String>) -> Self {
        Self { allowed_bins, env_passthrough, timeout: Duration::from_secs(120) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for CliExecuteTool {
    fn name(&self) -> &str {
        "cli-execute"
    }

    fn description(&self) -> &str {
        "Execute an allow-listed command-line binary with a filtered environment."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bin": {"type": "string"},
                "args": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["bin"],
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let bin = arguments
            .get("bin")
            .and_then(Value::as_str)
            .ok_or_else(|| RuntimeError::ToolError { name: "cli-execute".into(), message: "missing 'bin' argument".into() })?;

        if !self.allowed_bins.iter().any(|b| b == bin) {
            return Err(RuntimeError::ToolError {
                name: "cli-execute".into(),
                message: format!("binary '{bin}' is not in the allowed list"),
            });
        }

        let args: Vec<String> = arguments
            .get("args")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut command = Command::new(bin);
        command.args(&args).env_clear().kill_on_drop(true);
        for key in &self.env_passthrough {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }

        let output = command
            .output()
            .await
            .map_err(|e| RuntimeError::ToolError { name: "cli-execute".into(), message: format!("failed to spawn '{bin}': {e}") })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(RuntimeError::ToolError {
                name: "cli-execute".into(),
                message: format!("'{bin}' exited with {}: {stderr}", output.status),
            });
        }

        Ok(if stderr.is_empty() { stdout.into_owned() } else { format!("{stdout}\n{stderr}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_binaries_outside_the_allow_list() {
        let tool = CliExecuteTool::new(vec!["echo".to_string()], vec![]);
        let err = tool.call(json!({"bin": "rm", "args": ["-rf", "/"]})).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ToolError { .. }));
    }

    #[tokio::test]
    async fn runs_an_allowed_binary() {
        let tool = CliExecuteTool::new(vec!["echo".to_string()], vec![]);
        let output = tool.call(json!({"bin": "echo", "args": ["hello"]})).await.unwrap();
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn only_passes_through_declared_env_vars() {
        std::env::set_var("FORGE_TEST_CLI_VISIBLE", "visible");
        std::env::set_var("FORGE_TEST_CLI_HIDDEN", "hidden");
        let tool = CliExecuteTool::new(vec!["env".to_string()], vec!["FORGE_TEST_CLI_VISIBLE".to_string()]);
        let output = tool.call(json!({"bin": "env", "args": []})).await.unwrap();
        assert!(output.contains("FORGE_TEST_CLI_VISIBLE"));
        assert!(!output.contains("FORGE_TEST_CLI_HIDDEN"));
    }
}
