//! A small `LlmClient` trait with thin per-provider adapters, and the
//! `FallbackChain` that owns an ordered list of candidates (§4.2.3, Design
//! Notes "Fallback chain vs. wrapper").
//!
//! Grounded in the provider-abstraction shape hinted at by this workspace's
//! `rig-core`/`async-openai`/`ollama-rs` dependencies, built the way the
//! teacher's `generation` module wraps provider SDKs — but the chain is its
//! own client, not a decorator over a single one, so retry policy stays
//! inspectable in one place.

pub mod fallback;
pub mod openai_client;
pub mod provider;

pub use fallback::FallbackChain;
pub use provider::{CompletionRequest, LlmClient, ToolSchema};
