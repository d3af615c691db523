//! `forge`: the launcher binary. Parses the subcommand surface defined in
//! `cli.rs`, loads an `AgentConfig`, wires a `forge_runtime::Runner`, and
//! either serves it in the foreground or detaches it as a daemon (§5).

use anyhow::{Context, Result};
use clap::Parser;
use forge_cli::daemon::{self, DaemonState};
use forge_cli::{Cli, Command};
use forge_context::AgentConfig;
use forge_runtime::Runner;
use forge_server::{HttpServerConfig, JsonRpcServer};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config, working_dir, daemon: run_as_daemon, host, port } => {
            run(config, working_dir, run_as_daemon, host, port).await
        }
        Command::Stop { working_dir } => stop(working_dir).await,
        Command::Status { working_dir } => status(working_dir).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn resolve_working_dir(working_dir: Option<PathBuf>) -> Result<PathBuf> {
    match working_dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("failed to resolve current directory"),
    }
}

fn daemon_state_path(working_dir: &Path) -> PathBuf {
    working_dir.join(".forge").join("daemon.json")
}

async fn run(config_path: PathBuf, working_dir: Option<PathBuf>, run_as_daemon: bool, host: String, port: u16) -> Result<()> {
    let working_dir = resolve_working_dir(working_dir)?;

    if run_as_daemon {
        return spawn_daemon(&config_path, &working_dir, &host, port);
    }

    let config_path = if config_path.is_absolute() { config_path } else { working_dir.join(&config_path) };
    let config = AgentConfig::load(&config_path).with_context(|| format!("failed to load agent configuration at {}", config_path.display()))?;

    tracing::info!(agent_id = %config.agent_id, "starting forge runner");
    let runner = Runner::start(config, working_dir.clone()).await.context("runner startup failed")?;

    let state_path = daemon_state_path(&working_dir);
    let _ = DaemonState::remove(&state_path);

    let server_config = HttpServerConfig { host: host.clone(), port, ..HttpServerConfig::default() };
    let server = JsonRpcServer::new(server_config, runner);
    server.run(shutdown_signal()).await
}

/// §5: "A foreground runner can also be launched as a detached background
/// process; a small state file records pid/host/port."
fn spawn_daemon(config_path: &Path, working_dir: &Path, host: &str, port: u16) -> Result<()> {
    let exe = std::env::current_exe().context("failed to resolve current executable")?;
    let mut command = std::process::Command::new(exe);
    command
        .arg("run")
        .arg("--config")
        .arg(config_path)
        .arg("--working-dir")
        .arg(working_dir)
        .arg("--host")
        .arg(host)
        .arg("--port")
        .arg(port.to_string())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    let child = command.spawn().context("failed to spawn daemon process")?;
    let state = DaemonState { pid: child.id() as i32, host: host.to_string(), port };
    state.write(&daemon_state_path(working_dir)).context("failed to write daemon state file")?;
    println!("forge daemon started: pid={} host={} port={}", state.pid, state.host, state.port);
    Ok(())
}

async fn stop(working_dir: Option<PathBuf>) -> Result<()> {
    let working_dir = resolve_working_dir(working_dir)?;
    let state_path = daemon_state_path(&working_dir);
    let state = DaemonState::read(&state_path).context("no daemon is recorded for this working directory")?;

    daemon::stop(state.pid, Duration::from_secs(10)).context("failed to stop daemon")?;
    DaemonState::remove(&state_path)?;
    println!("forge daemon stopped (was pid={})", state.pid);
    Ok(())
}

async fn status(working_dir: Option<PathBuf>) -> Result<()> {
    let working_dir = resolve_working_dir(working_dir)?;
    let state_path = daemon_state_path(&working_dir);
    match DaemonState::read(&state_path) {
        Ok(state) if daemon::is_alive(state.pid) => {
            println!("running: pid={} host={} port={}", state.pid, state.host, state.port);
        }
        Ok(state) => {
            println!("stale: recorded pid={} is not alive", state.pid);
        }
        Err(_) => println!("not running"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
