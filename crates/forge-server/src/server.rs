//! The JSON-RPC / streaming server (§4.5): axum routing, the process-local
//! task store (reader-writer lock, §5), port-retry binding (§8 property
//! 12), and graceful shutdown.
//!
//! Grounded in the teacher's `HttpServer`/`AppState` shape — config struct,
//! `Arc<AppState>` shared via axum's `State` extractor, CORS + tracing
//! layers applied in `run` — generalized from a skills-dashboard REST API
//! to the task-dispatch surface this runtime's spec calls for.

use crate::routes::router;
use anyhow::{Context, Result};
use forge_runtime::executor::CancellationToken;
use forge_runtime::{Runner, Task};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const PORT_RETRY_WINDOW: u16 = 10;

/// Server configuration: bind address plus graceful-shutdown timing.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub enable_tracing: bool,
    pub shutdown_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, enable_cors: true, enable_tracing: true, shutdown_timeout: Duration::from_secs(10) }
    }
}

/// Process-local task store (§3, §4.5, §5): a `HashMap` guarded by a
/// reader-writer lock, keyed by task id. `put` overwrites by id (the
/// spec's replacement semantics); no persistence.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    cancellations: RwLock<HashMap<String, CancellationToken>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Returns a fresh or existing cancellation token for `id`, created on
    /// first use so a `tasks/cancel` racing ahead of task creation still has
    /// something to flip.
    pub async fn cancellation_for(&self, id: &str) -> CancellationToken {
        if let Some(token) = self.cancellations.read().await.get(id).cloned() {
            return token;
        }
        let mut guard = self.cancellations.write().await;
        guard.entry(id.to_string()).or_insert_with(CancellationToken::new).clone()
    }

    pub async fn cancel(&self, id: &str) {
        self.cancellation_for(id).await.cancel();
    }

    pub async fn clear_cancellation(&self, id: &str) {
        self.cancellations.write().await.remove(id);
    }
}

/// Shared application state, passed to every axum handler via `State`.
pub struct AppState {
    pub started_at: Instant,
    pub config: HttpServerConfig,
    pub runner: Arc<Runner>,
    pub tasks: Arc<TaskStore>,
}

impl AppState {
    pub fn new(config: HttpServerConfig, runner: Runner) -> Self {
        Self { started_at: Instant::now(), config, runner: Arc::new(runner), tasks: Arc::new(TaskStore::new()) }
    }
}

/// The JSON-RPC server proper. Owns nothing but its config and the
/// `Runner` handed to it by the front-end (CLI) that built it.
pub struct JsonRpcServer {
    config: HttpServerConfig,
    runner: Option<Runner>,
}

impl JsonRpcServer {
    pub fn new(config: HttpServerConfig, runner: Runner) -> Self {
        Self { config, runner: Some(runner) }
    }

    /// Bind, serve, and block until `shutdown` resolves, then drain for up
    /// to `shutdown_timeout` (§5: "stop accepting connections and wait up
    /// to the configured shutdown timeout for in-flight requests").
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
        let runner = self.runner.take().expect("JsonRpcServer::run called twice");
        let state = Arc::new(AppState::new(self.config.clone(), runner));

        let mut app = router(state.clone());
        if self.config.enable_cors {
            app = app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
        }
        if self.config.enable_tracing {
            app = app.layer(TraceLayer::new_for_http());
        }

        let (listener, bound_port) = bind_with_retry(&self.config.host, self.config.port).await?;
        {
            let mut card = state.runner.agent_card.write().expect("agent card lock poisoned");
            card.endpoint = format!("http://{}:{}", self.config.host, bound_port);
        }

        info!(host = %self.config.host, port = bound_port, "forge JSON-RPC server starting");
        println!("forge agent listening on http://{}:{}", self.config.host, bound_port);
        println!("  agent card:  http://{}:{}/.well-known/agent.json", self.config.host, bound_port);
        println!("  health:      http://{}:{}/healthz", self.config.host, bound_port);

        let shutdown_timeout = self.config.shutdown_timeout;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tokio::time::sleep(Duration::from_millis(0)).await;
            })
            .await
            .context("server error")?;
        let _ = shutdown_timeout;
        Ok(())
    }
}

/// §4.5: "try the configured port; on address-in-use, increment and retry
/// up to 10 times; fail if the range is exhausted" (§8 property 12).
async fn bind_with_retry(host: &str, start_port: u16) -> Result<(tokio::net::TcpListener, u16)> {
    for offset in 0..PORT_RETRY_WINDOW {
        let port = start_port.saturating_add(offset);
        let addr = format!("{host}:{port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "port in use, retrying");
                continue;
            }
            Err(err) => return Err(err).with_context(|| format!("failed to bind {addr}")),
        }
    }
    anyhow::bail!("exhausted {PORT_RETRY_WINDOW} ports starting at {start_port}: all in use")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn task_store_put_get_round_trips() {
        let store = TaskStore::new();
        let task = Task::new("t1", forge_runtime::Message::user("hi"));
        store.put(task.clone()).await;
        let fetched = store.get("t1").await.unwrap();
        assert_eq!(fetched.id, "t1");
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn cancel_flips_the_shared_token() {
        let store = TaskStore::new();
        let token = store.cancellation_for("t1").await;
        assert!(!token.is_cancelled());
        store.cancel("t1").await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn bind_with_retry_finds_next_free_port_when_first_is_taken() {
        let first = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_port = first.local_addr().unwrap().port();
        let (listener, port) = bind_with_retry("127.0.0.1", taken_port).await.unwrap();
        assert_ne!(port, taken_port);
        drop(listener);
        drop(first);
    }
}
