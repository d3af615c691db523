//! The egress enforcer (§4.7): wraps outbound HTTP with a mode + allow-list
//! decision, invoking an `on_attempt` hook before every request so auditing
//! stays the hook's responsibility, never the enforcer's own.
//!
//! Grounded in `docker_runtime.rs`'s wrap-and-validate-before-execute shape
//! (a thin decision function plus an unconditionally invoked hook), applied
//! here to a `reqwest::Client` rather than a `docker run` invocation.

use crate::errors::{Result, RuntimeError};
pub use forge_context::EgressMode;
use std::sync::Arc;
use url::Url;

/// Invoked before every attempted request, allowed or not. The enforcer
/// never logs on its own — the hook owns auditing.
pub type OnAttempt = Arc<dyn Fn(&str, bool) + Send + Sync>;

pub struct EgressEnforcer {
    mode: EgressMode,
    allowed_patterns: Vec<String>,
    on_attempt: Option<OnAttempt>,
    client: reqwest::Client,
}

impl EgressEnforcer {
    pub fn new(mode: EgressMode, allowed_patterns: Vec<String>) -> Self {
        Self { mode, allowed_patterns, on_attempt: None, client: reqwest::Client::new() }
    }

    pub fn with_on_attempt(mut self, hook: OnAttempt) -> Self {
        self.on_attempt = Some(hook);
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns `Ok(())` if `host` may be contacted under the current mode.
    pub fn check(&self, host: &str) -> Result<()> {
        let allowed = self.is_allowed(host);
        if let Some(hook) = &self.on_attempt {
            hook(host, allowed);
        }
        if allowed {
            Ok(())
        } else {
            Err(RuntimeError::EgressBlocked { host: host.to_string() })
        }
    }

    fn is_allowed(&self, host: &str) -> bool {
        match self.mode {
            EgressMode::DenyAll => false,
            EgressMode::AllowAll => true,
            EgressMode::AllowList => {
                self.allowed_patterns.iter().any(|pattern| host_matches(pattern, host))
            }
        }
    }

    /// Validate the request's target against the enforcer's mode + allow-list,
    /// then issue it (or refuse it) via the wrapped `reqwest::Client`.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let parsed = Url::parse(url).map_err(|e| RuntimeError::Config(format!("invalid URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RuntimeError::Config(format!("URL {url} has no host")))?;
        self.check(host)?;
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| RuntimeError::ToolError { name: "egress-client".into(), message: e.to_string() })
    }
}

/// Case-insensitive host match. Patterns are either an exact hostname or a
/// leading `*.` wildcard matching any single- or multi-level subdomain.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host.ends_with(&format!(".{suffix}"))
    } else {
        host == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn deny_all_blocks_everything() {
        let enforcer = EgressEnforcer::new(EgressMode::DenyAll, vec![]);
        assert!(enforcer.check("api.x.com").is_err());
    }

    #[test]
    fn allow_all_permits_everything() {
        let enforcer = EgressEnforcer::new(EgressMode::AllowAll, vec![]);
        assert!(enforcer.check("anything.example").is_ok());
    }

    /// §8 invariant 8: literal S8 matrix.
    #[test]
    fn allow_list_semantics_match_spec_matrix() {
        let enforcer =
            EgressEnforcer::new(EgressMode::AllowList, vec!["api.x.com".to_string(), "*.y.com".to_string()]);
        assert!(enforcer.check("api.x.com").is_ok());
        assert!(enforcer.check("x.com").is_err());
        assert!(enforcer.check("a.y.com").is_ok());
        assert!(enforcer.check("a.b.y.com").is_ok());
        assert!(enforcer.check("y.com").is_err());
        assert!(enforcer.check("zy.com").is_err());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let enforcer = EgressEnforcer::new(EgressMode::AllowList, vec!["API.X.COM".to_string()]);
        assert!(enforcer.check("api.x.com").is_ok());
    }

    #[test]
    fn on_attempt_hook_fires_for_both_allowed_and_blocked() {
        let count = Arc::new(AtomicUsize::new(0));
        let allowed_seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let allowed_clone = allowed_seen.clone();
        let count_clone = count.clone();
        let enforcer = EgressEnforcer::new(EgressMode::AllowList, vec!["ok.com".to_string()]).with_on_attempt(
            Arc::new(move |_host, allowed| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                allowed_clone.lock().unwrap().push(allowed);
            }),
        );
        let _ = enforcer.check("ok.com");
        let _ = enforcer.check("blocked.com");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(*allowed_seen.lock().unwrap(), vec![true, false]);
    }
}
