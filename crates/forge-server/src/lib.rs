//! The JSON-RPC / streaming server layer (§1, §4.5): exposes a
//! `forge_runtime::Runner`'s executor over a framed request/response
//! protocol with a streaming variant, correlation-scoped auditing (via
//! the runner's own `AuditLogger`), and graceful cancellation.
//!
//! ## Surface
//!
//! - `POST /` — dispatches on the JSON-RPC `method` field: `tasks/send`,
//!   `tasks/get`, `tasks/cancel` return a single buffered response;
//!   `tasks/sendSubscribe` upgrades the same endpoint to a sequence of
//!   framed `{event, data}` records over Server-Sent Events
//! - `GET /.well-known/agent.json` — the agent card published by the
//!   runner, behind its own reader-writer lock so hot-reload never blocks
//!   dispatch
//! - `GET /healthz` — liveness
//!
//! Out of scope here (§1): the CLI front-end, the local dashboard web UI,
//! the OAuth browser dance, the file-watcher, channel adapters, and
//! template rendering. This crate only binds a `Runner` to HTTP.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use server::{AppState, HttpServerConfig, JsonRpcServer, TaskStore};
