//! The scheduler store (§3, §4.1, §6): cron-like persistent schedules and a
//! bounded firing-history ring buffer, backed by a single markdown file.
//!
//! New code; the markdown read/write is grounded in the line-based
//! section-extraction idiom the teacher used for `SKILL.md` bodies,
//! generalized to the `## Schedule: <id>` / `## History` grammar of §6. The
//! `apalis`/`apalis-sql`/`sqlx` dependencies already in the workspace are
//! deliberately not used here — §3/§6 specify a single persisted markdown
//! file, not a database-backed queue; this store is only the persisted-state
//! half of "Scheduler store", not a firing mechanism.

pub mod markdown;
pub mod store;
pub mod types;

pub use store::ScheduleStore;
pub use types::{HistoryEntry, Schedule};
