//! `ScheduleStore`: the in-memory, reader-writer-locked view over
//! `SCHEDULES.md`, atomically rewritten on every mutation (§5: "every
//! mutation takes the write lock for the duration of the read-merge-write
//! cycle").

use super::markdown::{parse, render};
use super::types::{HistoryEntry, Schedule};
use crate::errors::Result;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const HISTORY_CAP: usize = 50;

struct State {
    schedules: Vec<Schedule>,
    history: Vec<HistoryEntry>,
}

pub struct ScheduleStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl ScheduleStore {
    /// Load `path` if it exists, otherwise start with an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (schedules, history) = match std::fs::read_to_string(&path) {
            Ok(content) => parse(&content),
            Err(_) => (Vec::new(), Vec::new()),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path, state: RwLock::new(State { schedules, history }) })
    }

    fn persist(&self, state: &State) -> Result<()> {
        let content = render(&state.schedules, &state.history);
        crate::util::atomic_write(&self.path, content.as_bytes())
    }

    /// Insert or replace a schedule by id, then persist.
    pub fn set(&self, schedule: Schedule) -> Result<()> {
        let mut state = self.state.write().expect("schedule store lock poisoned");
        match state.schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => *existing = schedule,
            None => state.schedules.push(schedule),
        }
        self.persist(&state)
    }

    pub fn get(&self, id: &str) -> Option<Schedule> {
        self.state.read().expect("schedule store lock poisoned").schedules.iter().find(|s| s.id == id).cloned()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().expect("schedule store lock poisoned");
        state.schedules.retain(|s| s.id != id);
        self.persist(&state)
    }

    /// In definition (insertion) order.
    pub fn list(&self) -> Vec<Schedule> {
        self.state.read().expect("schedule store lock poisoned").schedules.clone()
    }

    /// Append a firing record, then trim to the last `HISTORY_CAP` entries.
    pub fn record_history(&self, entry: HistoryEntry) -> Result<()> {
        let mut state = self.state.write().expect("schedule store lock poisoned");
        state.history.push(entry);
        if state.history.len() > HISTORY_CAP {
            let overflow = state.history.len() - HISTORY_CAP;
            state.history.drain(0..overflow);
        }
        self.persist(&state)
    }

    /// `schedule_id == ""` returns all entries, oldest first, up to `limit`.
    pub fn history(&self, schedule_id: &str, limit: usize) -> Vec<HistoryEntry> {
        let state = self.state.read().expect("schedule store lock poisoned");
        let mut matches: Vec<HistoryEntry> =
            state.history.iter().filter(|e| schedule_id.is_empty() || e.schedule_id == schedule_id).cloned().collect();
        if matches.len() > limit {
            let overflow = matches.len() - limit;
            matches.drain(0..overflow);
        }
        matches
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, seq: u64) -> HistoryEntry {
        HistoryEntry {
            timestamp: chrono::Utc::now(),
            schedule_id: id.to_string(),
            status: "ok".to_string(),
            duration_ms: seq,
            correlation_id: format!("corr-{seq}"),
            error: None,
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::open(dir.path().join("SCHEDULES.md")).unwrap();
        let schedule = Schedule::new("s1", "* * * * *", "ping");
        store.set(schedule.clone()).unwrap();
        assert_eq!(store.get("s1").unwrap().cron, schedule.cron);
    }

    #[test]
    fn delete_removes_schedule() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::open(dir.path().join("SCHEDULES.md")).unwrap();
        store.set(Schedule::new("s1", "* * * * *", "ping")).unwrap();
        store.delete("s1").unwrap();
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn list_preserves_definition_order() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::open(dir.path().join("SCHEDULES.md")).unwrap();
        store.set(Schedule::new("a", "* * * * *", "x")).unwrap();
        store.set(Schedule::new("b", "* * * * *", "y")).unwrap();
        let ids: Vec<String> = store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn history_is_pruned_to_fifty_entries() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::open(dir.path().join("SCHEDULES.md")).unwrap();
        for i in 0..60 {
            store.record_history(entry("s1", i)).unwrap();
        }
        let all = store.history("", 1000);
        assert_eq!(all.len(), 50);
        // newest entries survive the trim
        assert_eq!(all.last().unwrap().duration_ms, 59);
    }

    #[test]
    fn reopening_the_store_reads_back_persisted_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SCHEDULES.md");
        {
            let store = ScheduleStore::open(&path).unwrap();
            store.set(Schedule::new("s1", "* * * * *", "ping")).unwrap();
            store.record_history(entry("s1", 1)).unwrap();
        }
        let reopened = ScheduleStore::open(&path).unwrap();
        assert_eq!(reopened.get("s1").unwrap().id, "s1");
        assert_eq!(reopened.history("", 10).len(), 1);
    }
}
