//! `Schedule`/`HistoryEntry` data shapes (§3, §6).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: String,
    pub cron: String,
    pub task: String,
    pub skill: Option<String>,
    pub channel: Option<String>,
    pub channel_target: Option<String>,
    pub enabled: bool,
    pub source: String,
    pub created: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub run_count: u64,
}

impl Schedule {
    pub fn new(id: impl Into<String>, cron: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cron: cron.into(),
            task: task.into(),
            skill: None,
            channel: None,
            channel_target: None,
            enabled: true,
            source: "manual".to_string(),
            created: Utc::now(),
            last_run: None,
            last_status: None,
            run_count: 0,
        }
    }
}

/// A single firing of a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub schedule_id: String,
    pub status: String,
    pub duration_ms: u64,
    pub correlation_id: String,
    pub error: Option<String>,
}
