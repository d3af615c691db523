//! Declarative secrets configuration: the `secrets:` key of an agent
//! configuration document.
//!
//! This is config shape only — `providers` names the ordered provider chain
//! runner orchestration builds (§4.1 step 9, §4.6); the providers themselves
//! (`ChainProvider`, `EncryptedFileProvider`, environment-variable provider)
//! live in `forge_runtime::secrets` since they perform I/O.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The `secrets:` section of an agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecretsSection {
    /// Ordered provider names, e.g. `["env", "encrypted-file"]`. The runner
    /// builds a `ChainProvider` trying them in this order.
    #[serde(default)]
    pub providers: Vec<String>,

    /// Override for the encrypted secrets file path. Defaults to
    /// `~/.forge/secrets.enc` (agent-global) or `<workdir>/.forge/secrets.enc`
    /// (agent-local), resolved by the runner, not here.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_section() {
        let yaml = "providers: [env, encrypted-file]\n";
        let section: SecretsSection = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(section.providers, vec!["env", "encrypted-file"]);
        assert!(section.path.is_none());
    }

    #[test]
    fn defaults_are_empty() {
        let section = SecretsSection::default();
        assert!(section.providers.is_empty());
        assert!(section.path.is_none());
    }
}
