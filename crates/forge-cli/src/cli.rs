//! Minimal argument surface for launching and controlling the runner.
//!
//! The interactive wizard/TUI named as out-of-scope in the agent runtime
//! specification is a separate front-end; this surface exists only to
//! satisfy the daemon process model (§5) and is deliberately thin, grounded
//! in `skill-cli`'s `clap`-derive convention.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "forge", version, about = "Forge agent runtime launcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the runner against an agent configuration.
    Run {
        /// Path to the agent configuration YAML file.
        #[arg(long, default_value = "agent.yaml")]
        config: PathBuf,

        /// Working directory the runner resolves relative paths against.
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Run as a detached background process instead of foreground.
        #[arg(long)]
        daemon: bool,

        /// Host the JSON-RPC server binds to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port the JSON-RPC server binds to (auto-incremented up to 10
        /// times on address-in-use, §8 property 12).
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Stop a previously started daemon.
    Stop {
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
    /// Report whether a daemon is running and its bound address.
    Status {
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
}
