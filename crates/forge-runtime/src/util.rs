//! Small cross-module helpers.

use crate::errors::Result;
use std::io::Write;
use std::path::Path;

/// Tempfile-in-same-directory, write, fsync, rename. Used everywhere this
/// crate persists state that must never be observed half-written: secrets,
/// sessions, schedules.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let temp_path = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    ));
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
