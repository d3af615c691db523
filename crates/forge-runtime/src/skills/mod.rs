//! The skills subsystem: parsing, registry, requirement aggregation, risk
//! scoring, policy enforcement, and signing/integrity.

pub mod aggregate;
pub mod parser;
pub mod policy;
pub mod registry;
pub mod risk;
pub mod signing;

pub use aggregate::{aggregate_requirements, AggregatedRequirements};
pub use parser::{parse_skill_document, Frontmatter, SkillDocument, SkillEntry};
pub use policy::{PolicyEngine, PolicyViolation, ScriptPolicy, Severity, SkillPolicy};
pub use registry::{
    EmbeddedRegistry, LocalRegistry, Provenance, SkillDescriptor, SkillRegistry, Trust,
};
pub use risk::{classify_risk, score_skill, RiskLevel};
pub use signing::{
    compute_checksum, diff_manifest, generate_keypair, sign, verify, verify_checksum,
    ChecksumManifest, Keyring, ManifestDiff,
};
