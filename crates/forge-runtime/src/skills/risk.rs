//! Additive, bounded risk scoring for a skill (§4.4.4).

use crate::skills::registry::SkillDescriptor;

const TRUSTED_EGRESS_DOMAINS: &[&str] = &[
    "api.openai.com",
    "api.anthropic.com",
    "api.github.com",
    "*.amazonaws.com",
    "*.googleapis.com",
];

const HIGH_RISK_BINARIES: &[&str] = &[
    "bash", "sh", "python", "python3", "node", "ssh", "nc", "ncat", "netcat", "perl", "ruby",
];

const SENSITIVE_ENV_PATTERNS: &[&str] =
    &["SECRET", "PASSWORD", "PRIVATE_KEY", "SESSION_TOKEN", "CREDENTIALS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

pub fn classify_risk(score: u32) -> RiskLevel {
    match score {
        0 => RiskLevel::None,
        1..=25 => RiskLevel::Low,
        26..=50 => RiskLevel::Medium,
        51..=75 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// Additive score for a single skill, bounded at 100.
pub fn score_skill(skill: &SkillDescriptor) -> u32 {
    let mut score: u32 = 0;

    for domain in &skill.egress_domains {
        if TRUSTED_EGRESS_DOMAINS.iter().any(|t| domain_matches(t, domain)) {
            score += 2;
        } else {
            score += 10;
        }
    }
    if skill.egress_domains.len() > 5 {
        score += 15;
    }

    for bin in &skill.requirements.bins {
        if HIGH_RISK_BINARIES.contains(&bin.as_str()) {
            score += 15;
        } else {
            score += 3;
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
        if SENSITIVE_ENV_PATTERNS.iter().any(|p| upper.contains(p)) {
            score += 10;
        } else {
            score += 5;
        }
    }

    score.min(100)
}

/// The descriptor alone doesn't carry script presence — callers with a
/// registry handle ask `SkillRegistry::has_script` and pass it here.
pub fn score_skill_with_script(skill: &SkillDescriptor, has_script: bool) -> u32 {
    let base = score_skill(skill);
    if has_script {
        (base + 20).min(100)
    } else {
        base
    }
}

fn domain_matches(pattern: &str, domain: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        domain.eq_ignore_ascii_case(suffix)
            || domain.to_lowercase().ends_with(&format!(".{}", suffix.to_lowercase()))
    } else {
        pattern.eq_ignore_ascii_case(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::parser::{EnvRequirements, RequiresSpec};
    use crate::skills::registry::{Provenance, Source, Trust};

    fn skill(egress: &[&str], bins: &[&str], env_required: &[&str]) -> SkillDescriptor {
        SkillDescriptor {
            name: "gh".to_string(),
            display_name: "Gh".to_string(),
            description: String::new(),
            category: None,
            tags: Vec::new(),
            requirements: RequiresSpec {
                bins: bins.iter().map(|s| s.to_string()).collect(),
                env: EnvRequirements {
                    required: env_required.iter().map(|s| s.to_string()).collect(),
                    one_of: Vec::new(),
                    optional: Vec::new(),
                },
            },
            egress_domains: egress.iter().map(|s| s.to_string()).collect(),
            denied_tools: Vec::new(),
            timeout_hint: None,
            entries: Vec::new(),
            provenance: Provenance {
                source: Source::Local,
                trust: Trust::Local,
                checksum: String::new(),
                signer: String::new(),
            },
        }
    }

    #[test]
    fn s5_scenario_scores_ten_and_classifies_low() {
        let s = skill(&["api.github.com"], &["gh"], &["GH_TOKEN"]);
        let score = score_skill(&s);
        assert_eq!(score, 2 + 3 + 5);
        assert_eq!(classify_risk(score), RiskLevel::Low);
    }

    #[test]
    fn high_risk_binary_and_sensitive_env_score_higher() {
        let s = skill(&[], &["bash"], &["API_SECRET"]);
        let score = score_skill(&s);
        assert_eq!(score, 15 + 10);
        assert_eq!(classify_risk(score), RiskLevel::Low);
    }

    #[test]
    fn score_is_bounded_at_one_hundred() {
        let many_domains: Vec<&str> = vec!["a.com", "b.com", "c.com", "d.com", "e.com", "f.com", "g.com"];
        let s = skill(&many_domains, &["bash", "ssh", "nc"], &["A_SECRET", "B_PASSWORD", "C_CREDENTIALS"]);
        assert!(score_skill(&s) <= 100);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_risk(0), RiskLevel::None);
        assert_eq!(classify_risk(25), RiskLevel::Low);
        assert_eq!(classify_risk(26), RiskLevel::Medium);
        assert_eq!(classify_risk(50), RiskLevel::Medium);
        assert_eq!(classify_risk(51), RiskLevel::High);
        assert_eq!(classify_risk(75), RiskLevel::High);
        assert_eq!(classify_risk(76), RiskLevel::Critical);
    }
}
