//! Policy enforcement over a skill's aggregated risk profile (§4.4.5).
//!
//! Mirrors `DockerSecurityPolicy`/`validate_config`'s shape: a plain struct of
//! additive constraints with a custom `Default`, checked against a skill to
//! produce a list of violations rather than failing fast on the first one.

use crate::skills::registry::SkillDescriptor;
use crate::skills::risk::score_skill;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPolicy {
    Allow,
    Warn,
    Deny,
}

pub struct SkillPolicy {
    /// 0 = unbounded.
    pub max_egress_domains: usize,
    pub binary_denylist: Vec<String>,
    /// Substring match, uppercase-normalized.
    pub denied_env_patterns: Vec<String>,
    pub script_policy: ScriptPolicy,
    /// 0 = unbounded.
    pub max_risk_score: u32,
    pub extra_trusted_domains: Vec<String>,
}

impl Default for SkillPolicy {
    fn default() -> Self {
        Self {
            max_egress_domains: 0,
            binary_denylist: vec![
                "nc".to_string(),
                "ncat".to_string(),
                "netcat".to_string(),
                "nmap".to_string(),
                "ssh".to_string(),
                "scp".to_string(),
            ],
            denied_env_patterns: vec![
                "AWS_SECRET_ACCESS_KEY".to_string(),
                "AWS_SESSION_TOKEN".to_string(),
            ],
            script_policy: ScriptPolicy::Warn,
            max_risk_score: 75,
            extra_trusted_domains: Vec::new(),
        }
    }
}

pub struct PolicyEngine {
    policy: SkillPolicy,
}

impl PolicyEngine {
    pub fn new(policy: SkillPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate a skill, optionally told whether it carries an executable
    /// script (the registry, not the descriptor, knows this).
    pub fn check(&self, skill: &SkillDescriptor, has_script: bool) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if self.policy.max_egress_domains > 0
            && skill.egress_domains.len() > self.policy.max_egress_domains
        {
            violations.push(PolicyViolation {
                severity: Severity::Error,
                message: format!(
                    "skill '{}' declares {} egress domains, exceeding the policy maximum of {}",
                    skill.name,
                    skill.egress_domains.len(),
                    self.policy.max_egress_domains
                ),
            });
        }

        for bin in &skill.requirements.bins {
            if self.policy.binary_denylist.iter().any(|d| d == bin) {
                violations.push(PolicyViolation {
                    severity: Severity::Error,
                    message: format!("skill '{}' requires denylisted binary '{bin}'", skill.name),
                });
            }
        }

        let all_env = skill
            .requirements
            .env
            .required
            .iter()
            .chain(skill.requirements.env.optional.iter())
            .chain(skill.requirements.env.one_of.iter().flatten());
        for var in all_env {
            let upper = var.to_uppercase();
            for pattern in &self.policy.denied_env_patterns {
                if upper.contains(pattern.as_str()) {
                    violations.push(PolicyViolation {
                        severity: Severity::Error,
                        message: format!(
                            "skill '{}' declares env var '{var}' matching denied pattern '{pattern}'",
                            skill.name
                        ),
                    });
                }
            }
        }

        if has_script {
            match self.policy.script_policy {
                ScriptPolicy::Allow => {}
                ScriptPolicy::Warn => violations.push(PolicyViolation {
                    severity: Severity::Warning,
                    message: format!("skill '{}' carries an executable script", skill.name),
                }),
                ScriptPolicy::Deny => violations.push(PolicyViolation {
                    severity: Severity::Error,
                    message: format!("skill '{}' carries an executable script, denied by policy", skill.name),
                }),
            }
        }

        if self.policy.max_risk_score > 0 {
            let score = score_skill(skill);
            if score > self.policy.max_risk_score {
                violations.push(PolicyViolation {
                    severity: Severity::Error,
                    message: format!(
                        "skill '{}' risk score {score} exceeds policy maximum of {}",
                        skill.name, self.policy.max_risk_score
                    ),
                });
            }
        }

        violations
    }

    pub fn has_errors(violations: &[PolicyViolation]) -> bool {
        violations.iter().any(|v| v.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::parser::{EnvRequirements, RequiresSpec};
    use crate::skills::registry::{Provenance, Source, Trust};

    fn skill(bins: &[&str], env: &[&str]) -> SkillDescriptor {
        SkillDescriptor {
            name: "probe".to_string(),
            display_name: "Probe".to_string(),
            description: String::new(),
            category: None,
            tags: Vec::new(),
            requirements: RequiresSpec {
                bins: bins.iter().map(|s| s.to_string()).collect(),
                env: EnvRequirements {
                    required: env.iter().map(|s| s.to_string()).collect(),
                    one_of: Vec::new(),
                    optional: Vec::new(),
                },
            },
            egress_domains: Vec::new(),
            denied_tools: Vec::new(),
            timeout_hint: None,
            entries: Vec::new(),
            provenance: Provenance { source: Source::Local, trust: Trust::Local, checksum: String::new(), signer: String::new() },
        }
    }

    #[test]
    fn default_policy_denies_network_tools() {
        let engine = PolicyEngine::new(SkillPolicy::default());
        let violations = engine.check(&skill(&["nc"], &[]), false);
        assert!(PolicyEngine::has_errors(&violations));
    }

    #[test]
    fn default_policy_denies_aws_secret_env() {
        let engine = PolicyEngine::new(SkillPolicy::default());
        let violations = engine.check(&skill(&[], &["AWS_SECRET_ACCESS_KEY"]), false);
        assert!(PolicyEngine::has_errors(&violations));
    }

    #[test]
    fn default_policy_warns_but_does_not_error_on_scripts() {
        let engine = PolicyEngine::new(SkillPolicy::default());
        let violations = engine.check(&skill(&[], &[]), true);
        assert!(!violations.is_empty());
        assert!(!PolicyEngine::has_errors(&violations));
    }

    #[test]
    fn clean_skill_has_no_violations() {
        let engine = PolicyEngine::new(SkillPolicy::default());
        let violations = engine.check(&skill(&["curl"], &["API_KEY"]), false);
        assert!(violations.is_empty());
    }
}
