//! A directory of append-friendly per-session transcript files.
//!
//! Grounded in `audit.rs`'s append-file-with-mutex pattern (one file per
//! session instead of one shared log) and `sandbox.rs::cleanup_temp_dirs`'s
//! age-comparison-over-directory-entries idiom for `cleanup`.

use crate::errors::Result;
use crate::types::Message;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Append-only per-session transcript storage. Each session is one JSON
/// file holding an ordered `Vec<Message>`.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn load(&self, id: &str) -> Result<Vec<Message>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn append(&self, id: &str, message: &Message) -> Result<()> {
        let mut transcript = self.load(id)?;
        transcript.push(message.clone());
        self.overwrite(id, &transcript)
    }

    /// Atomically rewrite a session's transcript (used by the Compactor).
    pub fn overwrite(&self, id: &str, transcript: &[Message]) -> Result<()> {
        let path = self.path_for(id);
        let content = serde_json::to_vec(transcript)?;
        crate::util::atomic_write(&path, &content)
    }

    /// Delete sessions whose file hasn't been modified within `ttl`.
    pub fn cleanup(&self, ttl: Duration) -> Result<usize> {
        let mut removed = 0;
        if !self.root.exists() {
            return Ok(0);
        }
        let now = std::time::SystemTime::now();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let metadata = entry.metadata()?;
            if let Ok(modified) = metadata.modified() {
                if let Ok(age) = now.duration_since(modified) {
                    if age > ttl {
                        std::fs::remove_file(&path)?;
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }

    pub fn iterate(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.root.exists() {
            return Ok(ids);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.append("s1", &Message::user("hello")).unwrap();
        store.append("s1", &Message::assistant("hi")).unwrap();
        let transcript = store.load("s1").unwrap();
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn overwrite_replaces_whole_transcript() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.append("s1", &Message::user("hello")).unwrap();
        store.overwrite("s1", &[Message::system("summary")]).unwrap();
        let transcript = store.load("s1").unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn iterate_lists_all_session_ids() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.append("a", &Message::user("x")).unwrap();
        store.append("b", &Message::user("y")).unwrap();
        assert_eq!(store.iterate().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn cleanup_removes_only_stale_sessions() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.append("fresh", &Message::user("x")).unwrap();
        let removed = store.cleanup(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.iterate().unwrap(), vec!["fresh".to_string()]);
    }
}
