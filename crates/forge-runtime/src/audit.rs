//! Correlation-scoped structured audit events (§2, §4.1 step 6).
//!
//! One JSON-lines file, append-only, guarded by a mutex — the same shape the
//! teacher used for its credential audit trail, generalized to the event
//! vocabulary this runtime needs: task lifecycle, tool execution, egress
//! decisions, and guardrail verdicts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Audit event types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    TaskSubmitted,
    TaskCompleted,
    TaskFailed,
    TaskCanceled,
    ToolExecuted,
    ToolFailed,
    EgressAllowed,
    EgressBlocked,
    GuardrailViolation,
    SecretAccess,
    SecretStore,
    SecretDelete,
    ConfigLoad,
}

/// A single audit log entry. `metadata` never carries a raw secret value —
/// callers redact before attaching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Present for task/tool/egress events; empty for process-wide events
    /// (e.g. `ConfigLoad`).
    pub correlation_id: String,
    pub task_id: Option<String>,
    pub details: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType, correlation_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            correlation_id: correlation_id.into(),
            task_id: None,
            details: None,
            metadata: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Appends structured events to a single JSON-lines sink.
pub struct AuditLogger {
    log_file: Mutex<File>,
    log_path: PathBuf,
}

impl AuditLogger {
    /// Open (creating if necessary) the audit log at `~/.forge/audit.log`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("failed to resolve home directory")?;
        Self::at_path(home.join(".forge").join("audit.log"))
    }

    pub fn at_path(log_path: PathBuf) -> Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open audit log: {}", log_path.display()))?;

        Ok(Self { log_file: Mutex::new(log_file), log_path })
    }

    pub fn log(&self, entry: AuditEntry) -> Result<()> {
        let json = serde_json::to_string(&entry)?;
        let mut file = self
            .log_file
            .lock()
            .map_err(|e| anyhow::anyhow!("failed to lock audit log: {e}"))?;
        writeln!(file, "{json}")?;
        file.flush()?;

        tracing::debug!(
            event = ?entry.event_type,
            correlation_id = %entry.correlation_id,
            "audit event logged"
        );
        Ok(())
    }

    pub fn log_egress(&self, correlation_id: &str, host: &str, allowed: bool) -> Result<()> {
        let event_type = if allowed { AuditEventType::EgressAllowed } else { AuditEventType::EgressBlocked };
        self.log(AuditEntry::new(event_type, correlation_id).with_details(format!("host={host}")))
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Read the most recent `limit` entries, oldest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        use std::io::{BufRead, BufReader};

        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);
        let entries: Vec<AuditEntry> = reader
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        Ok(entries.into_iter().rev().take(limit).rev().collect())
    }

    /// All entries sharing a correlation id, in insertion order.
    pub fn read_correlated(&self, correlation_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self
            .read_recent(usize::MAX)?
            .into_iter()
            .filter(|e| e.correlation_id == correlation_id)
            .collect())
    }
}
