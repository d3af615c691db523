//! Daemon process model: detached background launch, pidfile, liveness probe,
//! and SIGTERM-then-SIGKILL stop semantics.
//!
//! Grounded in the teacher's background-service tracking idiom
//! (`TrackedService` in the HTTP server) generalized from "one child process
//! per declared service" to "one detached copy of this runner".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("no daemon state file at {0}")]
    NotRunning(PathBuf),
    #[error("daemon state file at {0} is malformed: {1}")]
    Malformed(PathBuf, String),
    #[error("process {0} did not stop within the shutdown timeout")]
    StopTimedOut(i32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// State recorded for a detached runner: pid, host, and the port it bound.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DaemonState {
    pub pid: i32,
    pub host: String,
    pub port: u16,
}

impl DaemonState {
    pub fn write(&self, state_path: &Path) -> Result<(), DaemonError> {
        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .expect("DaemonState serialization is infallible");
        fs::write(state_path, json)?;
        Ok(())
    }

    pub fn read(state_path: &Path) -> Result<DaemonState, DaemonError> {
        if !state_path.exists() {
            return Err(DaemonError::NotRunning(state_path.to_path_buf()));
        }
        let raw = fs::read_to_string(state_path)?;
        serde_json::from_str(&raw)
            .map_err(|e| DaemonError::Malformed(state_path.to_path_buf(), e.to_string()))
    }

    pub fn remove(state_path: &Path) -> Result<(), DaemonError> {
        if state_path.exists() {
            fs::remove_file(state_path)?;
        }
        Ok(())
    }
}

/// Probe liveness by sending a null signal to the recorded pid.
#[cfg(unix)]
pub fn is_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(pid: i32) -> bool {
    // No POSIX signals: fall back to the OS-specific process query.
    // The daemon is terminated directly via the platform kill primitive
    // instead of SIGTERM/SIGKILL on these targets.
    use std::process::Command;
    Command::new("tasklist")
        .arg("/FI")
        .arg(format!("PID eq {}", pid))
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Stop a daemon: SIGTERM, poll liveness every 200ms for up to `timeout`,
/// then SIGKILL.
#[cfg(unix)]
pub fn stop(pid: i32, timeout: Duration) -> Result<(), DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid);
    if kill(target, Signal::SIGTERM).is_err() {
        return Ok(()); // already gone
    }

    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if !is_alive(pid) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    if kill(target, Signal::SIGKILL).is_err() {
        return Ok(());
    }
    if is_alive(pid) {
        return Err(DaemonError::StopTimedOut(pid));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn stop(pid: i32, _timeout: Duration) -> Result<(), DaemonError> {
    use std::process::Command;
    let _ = Command::new("taskkill")
        .arg("/PID")
        .arg(pid.to_string())
        .arg("/F")
        .status();
    Ok(())
}
