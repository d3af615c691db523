//! Launcher library for the Forge agent runtime.
//!
//! The binary (`forge`) is a thin wrapper around this library: it parses a
//! small subcommand surface (run, stop, status), manages the daemon process
//! model described for the runner (pidfile, liveness probe, SIGTERM-then-
//! SIGKILL stop), and caches OAuth credentials for model providers that
//! support them. The interactive wizard, TUI, and dashboard are external
//! collaborators and are not part of this crate.

pub mod auth;
pub mod cli;
pub mod daemon;

pub use cli::{Cli, Command};
