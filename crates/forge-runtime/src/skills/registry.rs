//! Skill registries: embedded (baked into the binary) and local (filesystem).

use crate::errors::{Result, RuntimeError};
use crate::skills::parser::{parse_skill_document, RequiresSpec, SkillEntry};
use crate::skills::signing::{compute_checksum, Keyring};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trust {
    Builtin,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Embedded,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: Source,
    pub trust: Trust,
    pub checksum: String,
    /// Key id of the signature that verified, or empty if none did.
    pub signer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub requirements: RequiresSpec,
    pub egress_domains: Vec<String>,
    pub denied_tools: Vec<String>,
    pub timeout_hint: Option<u64>,
    pub entries: Vec<SkillEntry>,
    pub provenance: Provenance,
}

pub trait SkillRegistry: Send + Sync {
    fn list(&self) -> Vec<SkillDescriptor>;
    fn get(&self, name: &str) -> Option<SkillDescriptor>;
    fn load_content(&self, name: &str) -> Result<Vec<u8>>;
    fn has_script(&self, name: &str) -> bool;
    fn load_script(&self, name: &str, filename: Option<&str>) -> Result<Vec<u8>>;
    fn list_scripts(&self, name: &str) -> Result<Vec<String>>;
}

/// Descriptors compiled into the binary at build time.
#[derive(Default)]
pub struct EmbeddedRegistry {
    skills: HashMap<String, (SkillDescriptor, Vec<u8>)>,
}

impl EmbeddedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, content: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(content)
            .map_err(|e| RuntimeError::SkillParse(format!("SKILL.md is not valid UTF-8: {e}")))?;
        let doc = parse_skill_document(text)?;
        let name = doc
            .frontmatter
            .name
            .clone()
            .ok_or_else(|| RuntimeError::SkillParse("embedded skill missing frontmatter name".into()))?;
        let descriptor = descriptor_from_document(&name, &doc, content, Source::Embedded, Trust::Builtin, String::new());
        self.skills.insert(name, (descriptor, content.to_vec()));
        Ok(())
    }
}

impl SkillRegistry for EmbeddedRegistry {
    fn list(&self) -> Vec<SkillDescriptor> {
        self.skills.values().map(|(d, _)| d.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<SkillDescriptor> {
        self.skills.get(name).map(|(d, _)| d.clone())
    }

    fn load_content(&self, name: &str) -> Result<Vec<u8>> {
        self.skills
            .get(name)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| RuntimeError::SkillParse(format!("unknown embedded skill: {name}")))
    }

    fn has_script(&self, _name: &str) -> bool {
        false
    }

    fn load_script(&self, name: &str, _filename: Option<&str>) -> Result<Vec<u8>> {
        Err(RuntimeError::SkillParse(format!("embedded skill {name} has no scripts")))
    }

    fn list_scripts(&self, _name: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Descriptors discovered from a directory tree. Each top-level directory
/// whose name doesn't start with `.` or `_` and contains a `SKILL.md` is a
/// skill; an optional `scripts/` subdirectory holds executable scripts.
pub struct LocalRegistry {
    root: PathBuf,
    trusted_keys: Option<Keyring>,
}

impl LocalRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), trusted_keys: None }
    }

    pub fn with_trusted_keys(mut self, keyring: Keyring) -> Self {
        self.trusted_keys = Some(keyring);
        self
    }

    fn skill_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        if !self.root.exists() {
            return Ok(dirs);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name.starts_with('_') {
                continue;
            }
            if path.join("SKILL.md").is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// A sibling `SKILL.md.sig` holds a base64 Ed25519 signature, if present.
    fn verify_signature(&self, dir: &Path, content: &[u8]) -> String {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        use ed25519_dalek::Signature;

        let Some(ring) = &self.trusted_keys else { return String::new() };
        let sig_path = dir.join("SKILL.md.sig");
        let Ok(encoded) = std::fs::read_to_string(&sig_path) else { return String::new() };
        let Ok(raw) = BASE64.decode(encoded.trim()) else { return String::new() };
        let Ok(bytes): std::result::Result<[u8; 64], _> = raw.try_into() else { return String::new() };
        let signature = Signature::from_bytes(&bytes);
        let (id, ok) = ring.verify(content, &signature);
        if ok { id } else { String::new() }
    }

    fn load_descriptor(&self, dir: &Path) -> Result<SkillDescriptor> {
        let name = dir
            .file_name()
            .ok_or_else(|| RuntimeError::SkillParse(format!("invalid skill directory: {}", dir.display())))?
            .to_string_lossy()
            .to_string();
        let content = std::fs::read(dir.join("SKILL.md"))?;
        let text = std::str::from_utf8(&content)
            .map_err(|e| RuntimeError::SkillParse(format!("SKILL.md is not valid UTF-8: {e}")))?;
        let doc = parse_skill_document(text)?;

        let signer = self.verify_signature(dir, &content);

        Ok(descriptor_from_document(&name, &doc, &content, Source::Local, Trust::Local, signer))
    }
}

fn descriptor_from_document(
    dir_name: &str,
    doc: &crate::skills::parser::SkillDocument,
    content: &[u8],
    source: Source,
    trust: Trust,
    signer: String,
) -> SkillDescriptor {
    let forge = doc.frontmatter.forge().ok().flatten().unwrap_or_default();
    let name = doc.frontmatter.name.clone().unwrap_or_else(|| dir_name.to_string());
    let display_name = kebab_to_title_case(&name);
    SkillDescriptor {
        name,
        display_name,
        description: doc.frontmatter.description.clone().unwrap_or_default(),
        category: doc.frontmatter.category.clone(),
        tags: doc.frontmatter.deduped_tags(),
        requirements: forge.requires,
        egress_domains: forge.egress_domains,
        denied_tools: forge.denied_tools,
        timeout_hint: forge.timeout_hint,
        entries: doc.entries.clone(),
        provenance: Provenance { source, trust, checksum: compute_checksum(content), signer },
    }
}

fn kebab_to_title_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl SkillRegistry for LocalRegistry {
    fn list(&self) -> Vec<SkillDescriptor> {
        self.skill_dirs()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|dir| self.load_descriptor(&dir).ok())
            .collect()
    }

    fn get(&self, name: &str) -> Option<SkillDescriptor> {
        self.load_descriptor(&self.root.join(name)).ok()
    }

    fn load_content(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.root.join(name).join("SKILL.md"))?)
    }

    fn has_script(&self, name: &str) -> bool {
        self.root.join(name).join("scripts").is_dir()
    }

    fn load_script(&self, name: &str, filename: Option<&str>) -> Result<Vec<u8>> {
        let filename = filename
            .ok_or_else(|| RuntimeError::SkillParse("load_script requires a filename".into()))?;
        Ok(std::fs::read(self.root.join(name).join("scripts").join(filename))?)
    }

    fn list_scripts(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.root.join(name).join("scripts");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kebab_to_title_case_handles_multi_word_names() {
        assert_eq!(kebab_to_title_case("kubernetes-skill"), "Kubernetes Skill");
    }

    #[test]
    fn local_registry_discovers_skill_directories() {
        let dir = TempDir::new().unwrap();
        let skill_dir = dir.path().join("aws-skill");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "---\nname: aws-skill\ndescription: AWS tools\n---\n## Tool: get\nFetch.\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        std::fs::create_dir_all(dir.path().join("_private")).unwrap();

        let registry = LocalRegistry::new(dir.path());
        let skills = registry.list();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "aws-skill");
        assert_eq!(skills[0].provenance.trust, Trust::Local);
        assert!(skills[0].provenance.checksum.starts_with("sha256:"));
    }

    #[test]
    fn local_registry_lists_scripts() {
        let dir = TempDir::new().unwrap();
        let skill_dir = dir.path().join("tool");
        std::fs::create_dir_all(skill_dir.join("scripts")).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# Tool\n").unwrap();
        std::fs::write(skill_dir.join("scripts").join("run.sh"), "#!/bin/sh\n").unwrap();

        let registry = LocalRegistry::new(dir.path());
        assert!(registry.has_script("tool"));
        assert_eq!(registry.list_scripts("tool").unwrap(), vec!["run.sh".to_string()]);
    }
}
