//! Requirement aggregation across a selected set of skills (§3, §4.4.3).

use crate::skills::registry::SkillDescriptor;
use std::collections::{BTreeSet, HashSet};

/// The union over a set of selected skills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedRequirements {
    pub bins: Vec<String>,
    pub env_required: Vec<String>,
    /// Kept as per-skill groups; never merged across skills.
    pub env_one_of: Vec<Vec<String>>,
    pub env_optional: Vec<String>,
    pub denied_tools: Vec<String>,
    pub egress_domains: Vec<String>,
    pub max_timeout_hint: Option<u64>,
}

/// Aggregation is associative: the result is independent of skill order, and
/// the optional+required promotion rule is idempotent under repeated runs.
pub fn aggregate_requirements(skills: &[SkillDescriptor]) -> AggregatedRequirements {
    let mut bins: BTreeSet<String> = BTreeSet::new();
    let mut env_required: BTreeSet<String> = BTreeSet::new();
    let mut env_optional_candidates: BTreeSet<String> = BTreeSet::new();
    let mut env_one_of: Vec<Vec<String>> = Vec::new();
    let mut denied_tools: BTreeSet<String> = BTreeSet::new();
    let mut egress_domains: BTreeSet<String> = BTreeSet::new();
    let mut max_timeout_hint: Option<u64> = None;

    for skill in skills {
        bins.extend(skill.requirements.bins.iter().cloned());
        env_required.extend(skill.requirements.env.required.iter().cloned());
        env_optional_candidates.extend(skill.requirements.env.optional.iter().cloned());
        if !skill.requirements.env.one_of.is_empty() {
            env_one_of.push(skill.requirements.env.one_of.iter().flatten().cloned().collect());
        }
        denied_tools.extend(skill.denied_tools.iter().cloned());
        egress_domains.extend(skill.egress_domains.iter().cloned());
        if let Some(hint) = skill.timeout_hint {
            max_timeout_hint = Some(max_timeout_hint.map_or(hint, |m: u64| m.max(hint)));
        }
    }

    // Promotion: if any skill requires a var, it is required even if others
    // mark it optional. Remove promoted vars from the optional set.
    let required_set: HashSet<&String> = env_required.iter().collect();
    let env_optional: Vec<String> = env_optional_candidates
        .into_iter()
        .filter(|v| !required_set.contains(v))
        .collect();

    AggregatedRequirements {
        bins: bins.into_iter().collect(),
        env_required: env_required.into_iter().collect(),
        env_one_of,
        env_optional,
        denied_tools: denied_tools.into_iter().collect(),
        egress_domains: egress_domains.into_iter().collect(),
        max_timeout_hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::parser::{EnvRequirements, RequiresSpec};
    use crate::skills::registry::{Provenance, Source, Trust};

    fn skill(name: &str, bins: &[&str], env_required: &[&str], env_optional: &[&str]) -> SkillDescriptor {
        SkillDescriptor {
            name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            category: None,
            tags: Vec::new(),
            requirements: RequiresSpec {
                bins: bins.iter().map(|s| s.to_string()).collect(),
                env: EnvRequirements {
                    required: env_required.iter().map(|s| s.to_string()).collect(),
                    one_of: Vec::new(),
                    optional: env_optional.iter().map(|s| s.to_string()).collect(),
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
    fn promotes_optional_to_required_when_any_skill_requires_it() {
        let x = skill("x", &["curl"], &["K1"], &[]);
        let y = skill("y", &[], &[], &["K1"]);
        let agg = aggregate_requirements(&[x, y]);
        assert_eq!(agg.bins, vec!["curl"]);
        assert_eq!(agg.env_required, vec!["K1"]);
        assert!(agg.env_optional.is_empty());
    }

    #[test]
    fn aggregation_is_order_independent() {
        let x = skill("x", &["curl"], &["K1"], &[]);
        let y = skill("y", &["git"], &[], &["K2"]);
        let forward = aggregate_requirements(&[x.clone(), y.clone()]);
        let backward = aggregate_requirements(&[y, x]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn one_of_groups_stay_per_skill() {
        let mut x = skill("x", &[], &[], &[]);
        x.requirements.env.one_of = vec![vec!["A".into(), "B".into()]];
        let mut y = skill("y", &[], &[], &[]);
        y.requirements.env.one_of = vec![vec!["A".into(), "B".into()]];
        let agg = aggregate_requirements(&[x, y]);
        assert_eq!(agg.env_one_of.len(), 2);
    }
}
