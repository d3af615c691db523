//! Markdown rendering/parsing for `SCHEDULES.md` (§6).
//!
//! ```text
//! ## Schedule: <id>
//! - **ID:** <id>
//! - **Cron:** <cron>
//! ...
//!
//! ## History
//! | Timestamp | Schedule ID | Status | Duration | Correlation ID | Error |
//! |---|---|---|---|---|---|
//! | ... |
//! ```
//!
//! Parse errors in one `## Schedule: <id>` block are logged and that block
//! alone is dropped (§7: "must not silently discard unrelated sections when
//! one block fails to parse").

use super::types::{HistoryEntry, Schedule};
use chrono::{DateTime, Utc};

const HISTORY_HEADING: &str = "## History";

pub fn render(schedules: &[Schedule], history: &[HistoryEntry]) -> String {
    let mut out = String::new();
    for schedule in schedules {
        out.push_str(&render_schedule_block(schedule));
        out.push('\n');
    }
    out.push_str(HISTORY_HEADING);
    out.push('\n');
    out.push_str("| Timestamp | Schedule ID | Status | Duration | Correlation ID | Error |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for entry in history {
        out.push_str(&render_history_row(entry));
        out.push('\n');
    }
    out
}

fn render_schedule_block(s: &Schedule) -> String {
    format!(
        "## Schedule: {id}\n\
         - **ID:** {id}\n\
         - **Cron:** {cron}\n\
         - **Task:** {task}\n\
         - **Skill:** {skill}\n\
         - **Channel:** {channel}\n\
         - **Channel Target:** {channel_target}\n\
         - **Source:** {source}\n\
         - **Enabled:** {enabled}\n\
         - **Created:** {created}\n\
         - **Last Run:** {last_run}\n\
         - **Last Status:** {last_status}\n\
         - **Run Count:** {run_count}\n",
        id = s.id,
        cron = s.cron,
        task = escape_field(&s.task),
        skill = s.skill.as_deref().unwrap_or(""),
        channel = s.channel.as_deref().unwrap_or(""),
        channel_target = s.channel_target.as_deref().unwrap_or(""),
        source = s.source,
        enabled = s.enabled,
        created = s.created.to_rfc3339(),
        last_run = s.last_run.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string()),
        last_status = s.last_status.as_deref().unwrap_or(""),
        run_count = s.run_count,
    )
}

fn render_history_row(e: &HistoryEntry) -> String {
    format!(
        "| {} | {} | {} | {}ms | {} | {} |",
        e.timestamp.to_rfc3339(),
        e.schedule_id,
        e.status,
        e.duration_ms,
        e.correlation_id,
        e.error.as_deref().map(escape_field).unwrap_or_default(),
    )
}

fn escape_field(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

pub fn parse(content: &str) -> (Vec<Schedule>, Vec<HistoryEntry>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut schedules = Vec::new();
    let mut history = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end();
        if let Some(id) = line.strip_prefix("## Schedule: ") {
            let id = id.trim().to_string();
            let mut block = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].starts_with("## ") {
                block.push(lines[i]);
                i += 1;
            }
            match parse_schedule_block(&id, &block) {
                Ok(schedule) => schedules.push(schedule),
                Err(err) => tracing::warn!(schedule_id = %id, error = %err, "dropping malformed schedule block"),
            }
            continue;
        }
        if line.trim() == HISTORY_HEADING {
            i += 1;
            while i < lines.len() && !lines[i].starts_with("## ") {
                if let Some(entry) = parse_history_row(lines[i]) {
                    history.push(entry);
                }
                i += 1;
            }
            continue;
        }
        i += 1;
    }

    (schedules, history)
}

fn field(block: &[&str], name: &str) -> Option<String> {
    let prefix = format!("- **{name}:**");
    block.iter().find_map(|line| line.trim().strip_prefix(&prefix).map(|v| v.trim().to_string()))
}

fn parse_schedule_block(id: &str, block: &[&str]) -> Result<Schedule, String> {
    let cron = field(block, "Cron").ok_or("missing Cron field")?;
    let task = field(block, "Task").ok_or("missing Task field")?;
    let source = field(block, "Source").unwrap_or_else(|| "manual".to_string());
    let enabled = field(block, "Enabled").map(|v| v == "true").unwrap_or(true);
    let created = field(block, "Created")
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or("missing or invalid Created field")?;
    let last_run = field(block, "Last Run").and_then(|v| {
        if v == "never" {
            None
        } else {
            DateTime::parse_from_rfc3339(&v).ok().map(|dt| dt.with_timezone(&Utc))
        }
    });
    let run_count = field(block, "Run Count").and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    let last_status = field(block, "Last Status").filter(|v| !v.is_empty());
    let skill = field(block, "Skill").filter(|v| !v.is_empty());
    let channel = field(block, "Channel").filter(|v| !v.is_empty());
    let channel_target = field(block, "Channel Target").filter(|v| !v.is_empty());

    Ok(Schedule { id: id.to_string(), cron, task, skill, channel, channel_target, enabled, source, created, last_run, last_status, run_count })
}

fn parse_history_row(line: &str) -> Option<HistoryEntry> {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return None;
    }
    let cells: Vec<&str> = trimmed.trim_matches('|').split('|').map(str::trim).collect();
    if cells.len() != 6 || cells[0] == "Timestamp" || cells.iter().all(|c| c.chars().all(|ch| ch == '-')) {
        return None;
    }
    let timestamp = DateTime::parse_from_rfc3339(cells[0]).ok()?.with_timezone(&Utc);
    let duration_ms = cells[3].trim_end_matches("ms").parse::<u64>().ok()?;
    let error = if cells[5].is_empty() { None } else { Some(cells[5].replace("\\|", "|")) };
    Some(HistoryEntry {
        timestamp,
        schedule_id: cells[1].to_string(),
        status: cells[2].to_string(),
        duration_ms,
        correlation_id: cells[4].to_string(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new("s1", "0 9 * * *", "send report");
        s.skill = Some("reporter".to_string());
        s.channel = Some("slack".to_string());
        s.channel_target = Some("#ops".to_string());
        s.run_count = 3;
        s
    }

    #[test]
    fn render_then_parse_round_trips_a_schedule() {
        let schedule = sample_schedule();
        let rendered = render(std::slice::from_ref(&schedule), &[]);
        let (parsed, history) = parse(&rendered);
        assert_eq!(parsed.len(), 1);
        assert!(history.is_empty());
        assert_eq!(parsed[0].id, schedule.id);
        assert_eq!(parsed[0].cron, schedule.cron);
        assert_eq!(parsed[0].skill, schedule.skill);
        assert_eq!(parsed[0].run_count, 3);
    }

    #[test]
    fn render_then_parse_round_trips_history() {
        let entry = HistoryEntry {
            timestamp: Utc::now(),
            schedule_id: "s1".to_string(),
            status: "ok".to_string(),
            duration_ms: 120,
            correlation_id: "corr-1".to_string(),
            error: None,
        };
        let rendered = render(&[], std::slice::from_ref(&entry));
        let (_, history) = parse(&rendered);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].schedule_id, "s1");
        assert_eq!(history[0].duration_ms, 120);
    }

    #[test]
    fn malformed_block_is_dropped_without_discarding_others() {
        let good = render(&[sample_schedule()], &[]);
        let bad = "## Schedule: broken\n- **Cron:** * * * * *\n\n";
        let content = format!("{bad}{good}");
        let (parsed, _) = parse(&content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "s1");
    }

    #[test]
    fn never_run_schedule_parses_last_run_as_none() {
        let schedule = Schedule::new("never-run", "* * * * *", "noop");
        let rendered = render(&[schedule], &[]);
        let (parsed, _) = parse(&rendered);
        assert_eq!(parsed[0].last_run, None);
    }
}
