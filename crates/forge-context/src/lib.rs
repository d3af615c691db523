//! Declarative agent configuration loading for the Forge runtime.
//!
//! Owns the on-disk agent configuration document ([`AgentConfig`]), dotenv-
//! style environment file loading with `${VAR}` expansion, and the
//! declarative shape of the `secrets:` section. Everything that performs
//! secret storage I/O (the provider chain, the encrypted file, the keyring)
//! lives in `forge_runtime::secrets`; this crate only parses and validates
//! config.
//!
//! ```rust
//! use forge_context::AgentConfig;
//!
//! let yaml = r#"
//! agent_id: demo
//! version: "1.0"
//! model: { provider: openai, name: gpt-4o }
//! "#;
//! let config = AgentConfig::from_yaml(yaml).unwrap();
//! assert_eq!(config.agent_id, "demo");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod agent_config;
pub mod environment;
pub mod secrets;

pub use agent_config::{
    AgentConfig, ClientConfig, ClientRef, EgressMode, EgressSection, MemorySection, ModelConfig,
    ModelRef, SkillsSection, ToolRef,
};
pub use secrets::SecretsSection;

use thiserror::Error;

/// Errors that can occur while loading or validating an agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An `${VAR}` or `${VAR:?message}` reference had no value and no default.
    #[error("environment variable {0} is not set: {1}")]
    MissingEnvVar(String, String),

    /// The agent configuration document did not parse as YAML.
    #[error("invalid agent configuration YAML: {0}")]
    InvalidYaml(String),

    /// The agent configuration parsed but failed semantic validation.
    #[error("agent configuration failed validation: {0}")]
    Validation(String),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
