//! The `SecretsProvider` trait and the `ChainProvider` combinator (§4.6.1-2).

use crate::errors::{Result, RuntimeError};
use secrecy::SecretString;

/// A source of secret values. `get` reports "not found" as a tagged error,
/// never an empty string, so a `ChainProvider` can distinguish "try the next
/// provider" from "this provider has a real value". Values are returned
/// wrapped in `SecretString` so a leaked clone or an accidental `Debug` print
/// doesn't put plaintext secret material in logs or core dumps; callers that
/// need the raw value call `secrecy::ExposeSecret::expose_secret`.
pub trait SecretsProvider: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Result<SecretString>;
    fn list(&self) -> Result<Vec<String>>;
}

fn is_not_found(err: &RuntimeError) -> bool {
    matches!(err, RuntimeError::SecretNotFound(_))
}

/// Tries providers in order. `get` returns the first hit; a provider
/// returning a non-not-found error (e.g. decryption failure) aborts the
/// chain and propagates immediately — it is never masked by a later
/// provider's hit.
pub struct ChainProvider {
    providers: Vec<Box<dyn SecretsProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Box<dyn SecretsProvider>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, key: &str) -> Result<SecretString> {
        self.get_with_source(key).map(|(_, value)| value)
    }

    /// Same as [`get`](Self::get) but also returns the winning provider's name.
    pub fn get_with_source(&self, key: &str) -> Result<(String, SecretString)> {
        for provider in &self.providers {
            match provider.get(key) {
                Ok(value) => return Ok((provider.name().to_string(), value)),
                Err(err) if is_not_found(&err) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(RuntimeError::SecretNotFound(key.to_string()))
    }

    /// The ordered union of every provider's keys, deduplicated, preserving
    /// first-seen order.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for provider in &self.providers {
            for key in provider.list()? {
                if seen.insert(key.clone()) {
                    out.push(key);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubProvider {
        name: String,
        values: Mutex<HashMap<String, SecretString>>,
        hard_error_key: Option<String>,
    }

    impl StubProvider {
        fn new(name: &str, values: &[(&str, &str)]) -> Self {
            Self {
                name: name.to_string(),
                values: Mutex::new(values.iter().map(|(k, v)| (k.to_string(), SecretString::from(v.to_string()))).collect()),
                hard_error_key: None,
            }
        }

        fn with_hard_error(mut self, key: &str) -> Self {
            self.hard_error_key = Some(key.to_string());
            self
        }
    }

    impl SecretsProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn get(&self, key: &str) -> Result<SecretString> {
            if self.hard_error_key.as_deref() == Some(key) {
                return Err(RuntimeError::SecretDecryption("simulated hard failure".into()));
            }
            self.values
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| RuntimeError::SecretNotFound(key.to_string()))
        }

        fn list(&self) -> Result<Vec<String>> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }
    }

    #[test]
    fn chain_priority_first_provider_wins() {
        let chain = ChainProvider::new(vec![
            Box::new(StubProvider::new("a", &[("K", "from-a")])),
            Box::new(StubProvider::new("b", &[("K", "from-b")])),
        ]);
        let (source, value) = chain.get_with_source("K").unwrap();
        assert_eq!(source, "a");
        assert_eq!(value.expose_secret(), "from-a");
    }

    #[test]
    fn chain_falls_through_to_second_provider_when_first_lacks_key() {
        let chain = ChainProvider::new(vec![
            Box::new(StubProvider::new("a", &[])),
            Box::new(StubProvider::new("b", &[("K", "from-b")])),
        ]);
        assert_eq!(chain.get("K").unwrap().expose_secret(), "from-b");
    }

    #[test]
    fn non_not_found_error_aborts_chain() {
        let chain = ChainProvider::new(vec![
            Box::new(StubProvider::new("a", &[]).with_hard_error("K")),
            Box::new(StubProvider::new("b", &[("K", "from-b")])),
        ]);
        let err = chain.get("K").unwrap_err();
        assert!(matches!(err, RuntimeError::SecretDecryption(_)));
    }

    #[test]
    fn list_is_deduplicated_preserving_first_seen_order() {
        let chain = ChainProvider::new(vec![
            Box::new(StubProvider::new("a", &[("K1", "v1"), ("K2", "v2")])),
            Box::new(StubProvider::new("b", &[("K2", "v2-dup"), ("K3", "v3")])),
        ]);
        let mut keys = chain.list().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["K1".to_string(), "K2".to_string(), "K3".to_string()]);
    }
}
