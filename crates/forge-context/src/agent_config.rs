//! The on-disk agent configuration document and its resolved, startup-time
//! counterpart.
//!
//! `AgentConfig` mirrors the YAML shape verbatim (§3, §7): unknown top-level
//! keys are preserved via `extra` rather than rejected, so a newer scaffold
//! still loads against an older runner. `ModelConfig` is what the runner
//! resolves it into once API keys and base URLs are looked up.

use crate::secrets::SecretsSection;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub version: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    pub model: ModelRef,
    #[serde(default)]
    pub tools: Vec<ToolRef>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub skills: SkillsSection,
    #[serde(default)]
    pub secrets: SecretsSection,
    #[serde(default)]
    pub egress: EgressSection,
    #[serde(default)]
    pub memory: Option<MemorySection>,

    /// Unknown top-level keys, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AgentConfig {
    /// Parse from YAML text, then apply `${VAR}` expansion to every string
    /// value reachable through serde_json (runner orchestration step 2
    /// covers the model-name override separately).
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The fallback candidates in `model`, if any were configured.
    pub fn fallback_models(&self) -> &[ClientRef] {
        &self.model.fallbacks
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub name: String,
    #[serde(default)]
    pub fallbacks: Vec<ClientRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRef {
    pub provider: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillsSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EgressMode {
    DenyAll,
    AllowList,
    AllowAll,
}

impl Default for EgressMode {
    fn default() -> Self {
        EgressMode::DenyAll
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EgressSection {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub mode: EgressMode,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub capabilities: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySection {
    #[serde(default)]
    pub persistence: Option<bool>,
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,
    #[serde(default)]
    pub long_term: Option<bool>,
    #[serde(default)]
    pub memory_dir: Option<PathBuf>,
    #[serde(default)]
    pub char_budget: Option<usize>,
    #[serde(default)]
    pub trigger_ratio: Option<f32>,
    #[serde(default)]
    pub embedding_provider: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub vector_weight: Option<f32>,
    #[serde(default)]
    pub keyword_weight: Option<f32>,
    #[serde(default)]
    pub decay_half_life_days: Option<f32>,
}

/// A fully resolved model client: API key and base URL looked up, ready to
/// hand to an LLM client constructor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Resolved at startup from `ModelRef` plus provider lookups (runner
/// orchestration step 9).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub primary: ClientConfig,
    pub fallbacks: Vec<ClientConfig>,
}
