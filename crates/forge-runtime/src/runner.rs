//! Runner orchestration (§4.1): resolves an `AgentConfig` plus a working
//! directory into every live subsystem an agent needs and exposes the
//! handles a front-end (the JSON-RPC server, the CLI) drives.
//!
//! Steps below are numbered to match §4.1 verbatim. This module does not
//! bind HTTP routes itself (that's `forge-server`); it hands back a
//! `Runner` whose fields a server or CLI wires into its own surface.

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::egress::EgressEnforcer;
use crate::errors::{Result, RuntimeError};
use crate::executor::{Executor, HookRegistry, LoopExecutor, MockExecutor, SubprocessExecutor};
use crate::guardrail::GuardrailEngine;
use crate::llm::openai_client::OpenAiClient;
use crate::llm::{FallbackChain, LlmClient};
use crate::memory::{Compactor, LongTermMemory, SessionStore};
use crate::schedule::ScheduleStore;
use crate::secrets::{ChainProvider, EncryptedFileProvider, EnvProvider, SecretsProvider};
use crate::skills::{
    aggregate_requirements, parse_skill_document, AggregatedRequirements, EmbeddedRegistry, LocalRegistry, PolicyEngine, SkillDescriptor,
    SkillPolicy, SkillRegistry,
};
use crate::tools::{CliExecuteTool, MemoryGetTool, MemorySearchTool, ScriptTool, Tool, ToolRegistry};
use crate::types::AgentCard;
use forge_context::{AgentConfig, ClientConfig, ClientRef, EgressMode, ModelConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

const DEFAULT_CHAR_BUDGET: usize = 60_000;
const DEFAULT_TRIGGER_RATIO: f64 = 0.8;
const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const KEYRING_SERVICE: &str = "forge-agent-auth";

/// Everything a live agent needs, wired together. Cheap to clone: every
/// field is already `Arc`'d or copy-cheap.
pub struct Runner {
    pub agent_card: Arc<RwLock<AgentCard>>,
    pub executor: Arc<dyn Executor>,
    pub tools: Arc<ToolRegistry>,
    pub guardrail: Arc<GuardrailEngine>,
    pub egress: Arc<EgressEnforcer>,
    pub audit: Arc<AuditLogger>,
    pub secrets: Arc<ChainProvider>,
    pub schedules: Arc<ScheduleStore>,
    pub sessions: Option<Arc<SessionStore>>,
    pub long_term_memory: Option<Arc<LongTermMemory>>,
    pub working_dir: PathBuf,
}

impl Runner {
    /// §4.1 steps 1-15, in order. Fatal configuration errors abort here;
    /// everything else follows the best-effort/logged-warning convention
    /// each subsystem already documents.
    pub async fn start(mut config: AgentConfig, working_dir: PathBuf) -> Result<Runner> {
        // Step 1: overlay the agent's .env file into the process environment
        // without clobbering keys already set.
        let env_path = working_dir.join(".env");
        forge_context::environment::overlay_process_env(&env_path)
            .map_err(|e| RuntimeError::Config(format!("failed to load environment file: {e}")))?;

        // Step 2: model-name override, via FORGE_MODEL_OVERRIDE.
        if let Ok(override_name) = std::env::var("FORGE_MODEL_OVERRIDE") {
            if !override_name.is_empty() {
                tracing::info!(model = %override_name, "overriding configured model name");
                config.model.name = override_name;
            }
        }

        // Load the skills catalog up front; everything from here on (policy,
        // requirement aggregation, tool registration) depends on it.
        let skills = load_skills(&config, &working_dir)?;

        // Step 3: aggregated requirement validation. Required env must
        // resolve through a provider; at least one member of each one-of
        // group must resolve; missing optionals only warn.
        let secrets = Arc::new(build_secrets_chain(&config, &working_dir)?);
        let aggregated = aggregate_requirements(&skills);
        validate_requirements(&aggregated, secrets.as_ref())?;

        // Step 4: guardrail scaffold, best-effort.
        let guardrail_path = working_dir.join(".forge").join("guardrails.yaml");
        let guardrail = Arc::new(GuardrailEngine::load_scaffold(&guardrail_path));

        // Step 5: agent card.
        let agent_card = Arc::new(RwLock::new(AgentCard {
            id: config.agent_id.clone(),
            version: config.version.clone(),
            endpoint: String::new(),
            capabilities: skills.iter().map(|s| s.name.clone()).collect(),
        }));

        // Step 6: audit logger.
        let audit_path = working_dir.join(".forge").join("audit.log");
        let audit = Arc::new(
            AuditLogger::at_path(audit_path).map_err(|e| RuntimeError::Config(format!("failed to open audit log: {e}")))?,
        );
        audit
            .log(AuditEntry::new(AuditEventType::ConfigLoad, "startup").with_task(config.agent_id.clone()))
            .map_err(|e| RuntimeError::Config(format!("failed to write audit log: {e}")))?;

        // Step 8: tool registry, built before the executor since LoopExecutor
        // holds an Arc<ToolRegistry>.
        let tools = Arc::new(build_tool_registry(&config, &working_dir, &aggregated)?);

        // Step 9: model resolution, with fallback chain.
        let model_config = resolve_model_config(&config, secrets.as_ref())?;
        let llm = build_llm_client(&model_config);

        // Step 10: persistent session memory + compactor.
        let char_budget = config
            .memory
            .as_ref()
            .and_then(|m| m.char_budget)
            .unwrap_or(DEFAULT_CHAR_BUDGET);
        let trigger_ratio = config
            .memory
            .as_ref()
            .and_then(|m| m.trigger_ratio)
            .map(|r| r as f64)
            .unwrap_or(DEFAULT_TRIGGER_RATIO);

        let persistence_enabled = config.memory.as_ref().and_then(|m| m.persistence).unwrap_or(false);
        let sessions = if persistence_enabled {
            let sessions_dir = config
                .memory
                .as_ref()
                .and_then(|m| m.sessions_dir.clone())
                .unwrap_or_else(|| working_dir.join(".forge").join("sessions"));
            let store = Arc::new(SessionStore::new(sessions_dir)?);
            match store.cleanup(SESSION_TTL) {
                Ok(removed) if removed > 0 => tracing::info!(removed, "garbage-collected stale sessions"),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "session garbage collection failed"),
            }
            Some(store)
        } else {
            None
        };

        let mut hooks = HookRegistry::new();
        let _ = &mut hooks; // no hooks registered by default; front-ends may add their own.
        let hooks = Arc::new(hooks);

        let mut loop_executor = LoopExecutor::new(llm.clone(), tools.clone(), system_prompt(&config), char_budget)
            .with_hooks(hooks.clone())
            .with_trigger_ratio(trigger_ratio);
        if let Some(store) = &sessions {
            let compactor = Arc::new(Compactor::new(llm.clone()).with_session_store(store.clone()));
            loop_executor = loop_executor.with_compactor(compactor);
            loop_executor = loop_executor.with_session_store(store.clone());
        }

        // Step 7: select the executor implementation.
        let mock_tools = std::env::var("FORGE_MOCK_TOOLS").map(|v| v == "1").unwrap_or(false);
        let executor: Arc<dyn Executor> = if mock_tools {
            Arc::new(MockExecutor::new(tools.clone()))
        } else {
            match config.framework.as_deref() {
                Some("crewai") | Some("langchain") => {
                    let entrypoint = config
                        .entrypoint
                        .clone()
                        .ok_or_else(|| RuntimeError::Config("framework agents require an entrypoint".into()))?;
                    Arc::new(SubprocessExecutor::new(PathBuf::from(entrypoint), Vec::new()))
                }
                _ => Arc::new(loop_executor),
            }
        };

        // Step 11: long-term memory, keyword-only unless a sync embedder
        // adapter is available (none is implemented in this crate yet).
        let long_term_enabled = config.memory.as_ref().and_then(|m| m.long_term).unwrap_or(false);
        let long_term_memory = if long_term_enabled {
            let half_life = config
                .memory
                .as_ref()
                .and_then(|m| m.decay_half_life_days)
                .map(|d| d as f64)
                .unwrap_or(14.0);
            let memory = Arc::new(LongTermMemory::new(None, half_life));
            tools.register(Arc::new(MemorySearchTool::new(memory.clone())) as Arc<dyn Tool>);
            tools.register(Arc::new(MemoryGetTool::new(memory.clone())) as Arc<dyn Tool>);
            Some(memory)
        } else {
            None
        };

        // Step 12: egress enforcer with an audit-logging attempt hook.
        let egress = Arc::new(build_egress_enforcer(&config, audit.clone()));

        // Scheduler store (§3, §6), opened unconditionally: schedules can be
        // registered at any point in an agent's lifetime, not only at start.
        let schedules_path = working_dir.join(".forge").join("memory").join("SCHEDULES.md");
        let schedules = Arc::new(ScheduleStore::open(schedules_path)?);

        // Steps 13-14 (JSON-RPC binding, file-watcher reload) are owned by
        // the server front-end; this runner only exposes the handles above.
        // Step 15 (banner, serve, graceful shutdown) is likewise the
        // front-end's responsibility.

        Ok(Runner {
            agent_card,
            executor,
            tools,
            guardrail,
            egress,
            audit,
            secrets,
            schedules,
            sessions,
            long_term_memory,
            working_dir,
        })
    }
}

fn system_prompt(config: &AgentConfig) -> String {
    format!("You are agent '{}', version {}.", config.agent_id, config.version)
}

fn load_skills(config: &AgentConfig, working_dir: &Path) -> Result<Vec<SkillDescriptor>> {
    let skills_path = config
        .skills
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from("skills"));
    let root = if skills_path.is_absolute() { skills_path } else { working_dir.join(skills_path) };

    if !root.exists() {
        return Ok(Vec::new());
    }

    if root.is_file() {
        let content = std::fs::read_to_string(&root)?;
        let doc = parse_skill_document(&content)?;
        let mut registry = EmbeddedRegistry::new();
        registry.register(content.as_bytes())?;
        let _ = doc; // registry owns the parsed document from here
        return Ok(registry.list());
    }

    let trusted_keys_dir = working_dir.join(".forge").join("trusted-keys");
    let registry = if trusted_keys_dir.exists() {
        let keyring = crate::skills::signing::Keyring::load_dir(&trusted_keys_dir)?;
        LocalRegistry::new(root).with_trusted_keys(keyring)
    } else {
        LocalRegistry::new(root)
    };
    Ok(registry.list())
}

fn validate_requirements(aggregated: &AggregatedRequirements, secrets: &ChainProvider) -> Result<()> {
    for key in &aggregated.env_required {
        secrets
            .get(key)
            .map_err(|_| RuntimeError::Config(format!("required environment variable '{key}' is not resolvable through any configured secrets provider")))?;
    }
    for group in &aggregated.env_one_of {
        if group.is_empty() {
            continue;
        }
        let resolved = group.iter().any(|key| secrets.get(key).is_ok());
        if !resolved {
            return Err(RuntimeError::Config(format!(
                "at least one of [{}] must resolve through a configured secrets provider",
                group.join(", ")
            )));
        }
    }
    for key in &aggregated.env_optional {
        if secrets.get(key).is_err() {
            tracing::warn!(key = %key, "optional environment variable not resolvable, proceeding without it");
        }
    }
    Ok(())
}

fn build_secrets_chain(config: &AgentConfig, working_dir: &Path) -> Result<ChainProvider> {
    let mut providers: Vec<Box<dyn SecretsProvider>> = Vec::new();
    let names = if config.secrets.providers.is_empty() {
        vec!["env".to_string()]
    } else {
        config.secrets.providers.clone()
    };

    for name in &names {
        match name.as_str() {
            "env" => providers.push(Box::new(EnvProvider::new(known_env_keys()))),
            "encrypted-file" => {
                let path = config.secrets.path.clone().unwrap_or_else(|| {
                    dirs::home_dir()
                        .map(|home| home.join(".forge").join("secrets.enc"))
                        .unwrap_or_else(|| working_dir.join(".forge").join("secrets.enc"))
                });
                let passphrase: crate::secrets::encrypted_file::PassphraseFn = Box::new(|| {
                    std::env::var("FORGE_SECRETS_PASSPHRASE")
                        .map_err(|_| RuntimeError::SecretProvider("FORGE_SECRETS_PASSPHRASE is not set".into()))
                });
                providers.push(Box::new(EncryptedFileProvider::new(path, passphrase)));
            }
            other => {
                return Err(RuntimeError::Config(format!("unknown secrets provider '{other}'")));
            }
        }
    }

    Ok(ChainProvider::new(providers))
}

/// `EnvProvider::list` requires a declared set of keys it is willing to
/// report; the process environment otherwise has no enumerable bound.
/// Provider API keys are the keys a runner will ever look up by name, so
/// that's the declared set.
fn known_env_keys() -> Vec<String> {
    vec![
        "OPENAI_API_KEY".to_string(),
        "ANTHROPIC_API_KEY".to_string(),
        "AZURE_API_KEY".to_string(),
        "GROQ_API_KEY".to_string(),
        "MISTRAL_API_KEY".to_string(),
    ]
}

fn build_tool_registry(config: &AgentConfig, working_dir: &Path, aggregated: &AggregatedRequirements) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    let cli_tool_ref = config.tools.iter().find(|t| t.name == "cli-execute");
    let allowed_bins = cli_tool_ref
        .and_then(|t| t.config.get("allowed_bins"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| aggregated.bins.clone());
    let env_passthrough = cli_tool_ref
        .and_then(|t| t.config.get("env_passthrough"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| aggregated.env_required.iter().chain(aggregated.env_optional.iter()).cloned().collect());

    if !allowed_bins.is_empty() {
        registry.register(Arc::new(CliExecuteTool::new(allowed_bins, env_passthrough)));
    }

    let tools_dir = working_dir.join("tools");
    for script in ScriptTool::discover(&tools_dir) {
        registry.register(Arc::new(script));
    }

    Ok(registry)
}

fn resolve_model_config(config: &AgentConfig, secrets: &ChainProvider) -> Result<ModelConfig> {
    let primary = resolve_client_config(&config.model.provider, &config.model.name, secrets);
    let fallbacks = config
        .fallback_models()
        .iter()
        .map(|c: &ClientRef| resolve_client_config(&c.provider, &c.name, secrets))
        .collect();
    Ok(ModelConfig { primary, fallbacks })
}

/// §4.1 step 9: prefer a provider's OAuth token when no API key is
/// configured but the OS keyring already holds credentials for it. There is
/// no concrete `AuthProvider` implementation in this crate (the OAuth dance
/// itself is out of scope); this narrow check only looks for a token a
/// collaborator already stored under the shared service name.
fn resolve_client_config(provider: &str, name: &str, secrets: &ChainProvider) -> ClientConfig {
    use secrecy::ExposeSecret;
    let env_key = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));
    let api_key = secrets.get(&env_key).ok().map(|s| s.expose_secret().to_string()).or_else(|| oauth_token(provider));
    ClientConfig { provider: provider.to_string(), model: name.to_string(), api_key, base_url: None }
}

fn oauth_token(provider: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{provider}:global:default"))
        .ok()
        .and_then(|entry| entry.get_password().ok())
}

fn build_llm_client(model_config: &ModelConfig) -> Arc<dyn LlmClient> {
    let primary: Box<dyn LlmClient> = Box::new(OpenAiClient::new(
        model_config.primary.provider.clone(),
        model_config.primary.model.clone(),
        model_config.primary.api_key.clone(),
        model_config.primary.base_url.clone(),
    ));

    if model_config.fallbacks.is_empty() {
        return Arc::new(primary_into_chain(primary));
    }

    let mut candidates = vec![primary];
    for fallback in &model_config.fallbacks {
        candidates.push(Box::new(OpenAiClient::new(
            fallback.provider.clone(),
            fallback.model.clone(),
            fallback.api_key.clone(),
            fallback.base_url.clone(),
        )));
    }
    Arc::new(FallbackChain::new(candidates))
}

/// `FallbackChain::new` asserts a nonempty candidate list; wrap a lone
/// primary in a one-candidate chain so callers always hold the same type.
fn primary_into_chain(primary: Box<dyn LlmClient>) -> FallbackChain {
    FallbackChain::new(vec![primary])
}

fn build_egress_enforcer(config: &AgentConfig, audit: Arc<AuditLogger>) -> EgressEnforcer {
    let mode = config.egress.mode.clone();
    let mut patterns = config.egress.allowed_domains.clone();
    if let Some(profile) = &config.egress.profile {
        if profile == "strict" {
            // Strict profile adds nothing beyond the explicit allow-list;
            // documented for operators who expect a profile name to imply
            // a baseline.
            tracing::debug!(profile = %profile, "egress profile recognized, no implicit domains added");
        }
    }
    patterns.sort();
    patterns.dedup();

    let on_attempt: crate::egress::OnAttempt = Arc::new(move |host, allowed| {
        if let Err(err) = audit.log_egress("runner", host, allowed) {
            tracing::warn!(error = %err, "failed to write egress audit entry");
        }
    });

    EgressEnforcer::new(mode, patterns).with_on_attempt(on_attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(agent_id: &str) -> AgentConfig {
        let yaml = format!(
            "agent_id: {agent_id}\nversion: \"1.0\"\nmodel:\n  provider: openai\n  name: gpt-4o\n"
        );
        AgentConfig::from_yaml(&yaml).unwrap()
    }

    #[tokio::test]
    async fn starts_with_minimal_config_and_no_skills_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = minimal_config("demo");
        let runner = Runner::start(config, dir.path().to_path_buf()).await.unwrap();
        assert_eq!(runner.agent_card.read().unwrap().id, "demo");
        assert!(runner.sessions.is_none());
        assert!(runner.long_term_memory.is_none());
    }

    #[tokio::test]
    async fn fails_startup_when_a_skill_requires_unset_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let skill_dir = dir.path().join("skills").join("needs-secret");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: needs-secret\nmetadata:\n  forge:\n    requires:\n      env:\n        required: [FORGE_TEST_RUNNER_MISSING_VAR]\n---\nBody.\n",
        )
        .unwrap();
        std::env::remove_var("FORGE_TEST_RUNNER_MISSING_VAR");

        let config = minimal_config("demo2");
        let err = Runner::start(config, dir.path().to_path_buf()).await.unwrap_err();
        match err {
            RuntimeError::Config(msg) => assert!(msg.contains("FORGE_TEST_RUNNER_MISSING_VAR")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn enables_persistent_memory_when_configured() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml = "agent_id: demo3\nversion: \"1.0\"\nmodel:\n  provider: openai\n  name: gpt-4o\nmemory:\n  persistence: true\n";
        let config = AgentConfig::from_yaml(yaml).unwrap();
        let runner = Runner::start(config, dir.path().to_path_buf()).await.unwrap();
        assert!(runner.sessions.is_some());
    }
}
