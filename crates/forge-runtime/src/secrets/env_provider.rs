//! The simplest `SecretsProvider`: the process environment.

use crate::errors::{Result, RuntimeError};
use crate::secrets::provider::SecretsProvider;
use secrecy::SecretString;

pub struct EnvProvider {
    /// Keys this provider is willing to report via `list`. The process
    /// environment is otherwise unbounded, so `list` without a declared set
    /// would leak unrelated host environment variables into aggregation.
    known_keys: Vec<String>,
}

impl EnvProvider {
    pub fn new(known_keys: Vec<String>) -> Self {
        Self { known_keys }
    }
}

impl SecretsProvider for EnvProvider {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Result<SecretString> {
        std::env::var(key).map(SecretString::from).map_err(|_| RuntimeError::SecretNotFound(key.to_string()))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.known_keys.iter().filter(|k| std::env::var(k).is_ok()).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn finds_set_variable_and_reports_not_found_otherwise() {
        std::env::set_var("FORGE_TEST_SECRET_ENV_KEY", "value");
        let provider = EnvProvider::new(vec!["FORGE_TEST_SECRET_ENV_KEY".to_string()]);
        assert_eq!(provider.get("FORGE_TEST_SECRET_ENV_KEY").unwrap().expose_secret(), "value");
        assert!(matches!(
            provider.get("FORGE_TEST_SECRET_ENV_MISSING").unwrap_err(),
            RuntimeError::SecretNotFound(_)
        ));
    }

    #[test]
    fn list_only_reports_known_keys_that_are_set() {
        std::env::set_var("FORGE_TEST_SECRET_ENV_LIST", "v");
        let provider = EnvProvider::new(vec![
            "FORGE_TEST_SECRET_ENV_LIST".to_string(),
            "FORGE_TEST_SECRET_ENV_UNSET".to_string(),
        ]);
        assert_eq!(provider.list().unwrap(), vec!["FORGE_TEST_SECRET_ENV_LIST".to_string()]);
    }
}
