//! `ScriptTool`: wraps a single executable discovered under an agent's
//! `tools/` directory (§4.1 step 8: "discover custom tool scripts under the
//! agent's `tools/` directory"). The script receives its call arguments as
//! a single JSON-encoded argv entry and must print its result to stdout;
//! nonzero exit or stderr output is folded into a `RuntimeError::ToolError`
//! the same way `CliExecuteTool` reports a failed command.

use crate::errors::{Result, RuntimeError};
use crate::tools::registry::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

pub struct ScriptTool {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl ScriptTool {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into(), timeout: Duration::from_secs(120) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scan `dir` for executable files (one level deep) and wrap each as a
    /// tool named after its file stem. Missing directory yields no tools.
    pub fn discover(dir: &std::path::Path) -> Vec<Self> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut tools = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_executable(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            tools.push(ScriptTool::new(stem.to_string(), path));
        }
        tools
    }
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|meta| meta.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &std::path::Path) -> bool {
    true
}

#[async_trait]
impl Tool for ScriptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Custom tool script discovered under the agent's tools/ directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let output = Command::new(&self.path)
            .arg(arguments.to_string())
            .output()
            .await
            .map_err(|e| RuntimeError::ToolError { name: self.name.clone(), message: format!("failed to spawn: {e}") })?;

        if !output.status.success() {
            return Err(RuntimeError::ToolError {
                name: self.name.clone(),
                message: format!("exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
