//! forge-runtime - the execution engine behind Forge agents.
//!
//! This crate owns everything that runs once an `AgentConfig` (from
//! `forge-context`) has been resolved into a live agent: the tool-using
//! inference loop, the skills pipeline (parsing, registry, risk scoring,
//! policy, signing), the encrypted secrets core, the egress enforcer, the
//! markdown-backed scheduler store, and the audit log every one of those
//! subsystems writes through.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Runner                      │
//! │   (resolves config, wires every subsystem)    │
//! └──────────────────────────────────────────────┘
//!                       │
//!     ┌────────┬────────┼────────┬────────┬────────┐
//!     ▼        ▼        ▼        ▼        ▼        ▼
//! ┌───────┐┌──────┐┌────────┐┌───────┐┌────────┐┌────────┐
//! │Executor││Skills││Secrets ││Egress ││Schedule││ Memory │
//! │(loop)  ││      ││(core)  ││       ││(store) ││        │
//! └───────┘└──────┘└────────┘└───────┘└────────┘└────────┘
//!                       │
//!                       ▼
//!                 ┌──────────┐
//!                 │  Audit   │
//!                 └──────────┘
//! ```
//!
//! # Security model
//!
//! - Tool calls run behind a bounded timeout and a panic boundary
//!   (`tools::ToolRegistry::dispatch`) — a misbehaving tool degrades to an
//!   error-marked transcript entry, never a crashed task.
//! - Skills declare required secrets/env/egress in `SKILL.md` frontmatter;
//!   `skills::aggregate_requirements` merges these across the skills
//!   attached to a task before anything executes.
//! - Egress is deny-by-default outside an explicit allow-list
//!   (`egress::EgressEnforcer`), and every attempt is audited.
//! - Secrets are resolved through a provider chain that never logs a
//!   decrypted value (`secrets::ChainProvider`).

pub mod audit;
pub mod egress;
pub mod embeddings;
pub mod errors;
pub mod executor;
pub mod guardrail;
pub mod llm;
pub mod memory;
pub mod runner;
pub mod schedule;
pub mod secrets;
pub mod skills;
pub mod tools;
pub mod types;
pub mod util;

pub use audit::{AuditEntry, AuditEventType, AuditLogger};
pub use egress::{EgressEnforcer, EgressMode};
pub use errors::{Result, RuntimeError};
pub use executor::{
    CancellationToken, EventStream, Executor, Hook, HookContext, HookRegistry, LoopExecutor, MockExecutor, StepEvent, SubprocessExecutor,
};
pub use guardrail::{Direction, GuardrailEngine, GuardrailRule, GuardrailViolation};
pub use llm::{CompletionRequest, FallbackChain, LlmClient, ToolSchema};
pub use memory::{Compactor, KeywordIndex, LongTermMemory, ScoredSnippet, SessionStore};
pub use runner::Runner;
pub use schedule::{HistoryEntry, Schedule, ScheduleStore};
pub use secrets::{ChainProvider, EncryptedFileProvider, EnvProvider, SecretsProvider};
pub use skills::{
    aggregate_requirements, compute_checksum, diff_manifest, generate_keypair, sign, verify, verify_checksum, AggregatedRequirements,
    ChecksumManifest, EmbeddedRegistry, Frontmatter, Keyring, LocalRegistry, ManifestDiff, PolicyEngine, PolicyViolation, Provenance,
    RiskLevel, ScriptPolicy, Severity, SkillDescriptor, SkillDocument, SkillEntry, SkillPolicy, SkillRegistry, Trust, classify_risk,
    parse_skill_document, score_skill,
};
pub use tools::{CliExecuteTool, MemoryGetTool, MemorySearchTool, Tool, ToolRegistry};
pub use types::*;

pub use embeddings::{
    create_provider, EmbeddingConfig, EmbeddingProvider, EmbeddingProviderFactory, EmbeddingProviderType, FastEmbedModel, FastEmbedProvider,
    OllamaProvider, OpenAIEmbedProvider, OpenAIEmbeddingModel,
};
