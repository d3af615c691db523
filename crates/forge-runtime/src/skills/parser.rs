//! SKILL.md parsing: YAML frontmatter plus `## Tool: <name>` entry detection.
//!
//! Frontmatter extraction stays a raw `---`-delimited string split, same as
//! SKILL.md parsing elsewhere in this tree. Entry detection walks the body
//! as a `pulldown_cmark` event stream (heading/strong/list-item events)
//! instead of hand-rolled line scanning, replacing the tool-documentation
//! extraction with the entry grammar described for the catalog format: only
//! the `forge` metadata namespace is interpreted, every other namespace is
//! carried through untouched.

use crate::errors::{Result, RuntimeError};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// YAML frontmatter at the top of a SKILL.md document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// namespace -> arbitrary mapping. Only `forge` is interpreted.
    #[serde(default)]
    pub metadata: HashMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    pub fn forge(&self) -> Result<Option<ForgeMetadata>> {
        match self.metadata.get("forge") {
            Some(value) => {
                let parsed: ForgeMetadata = serde_yaml::from_value(value.clone())
                    .map_err(|e| RuntimeError::SkillParse(format!("invalid forge metadata: {e}")))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// §6: category must be a single lowercase token; tags must match
    /// `[a-z0-9-]+` and are deduplicated; violations are parse errors.
    pub fn validate(&self) -> Result<()> {
        if let Some(category) = &self.category {
            if category.contains(' ') || category != &category.to_lowercase() {
                return Err(RuntimeError::SkillParse(format!(
                    "category '{category}' must be a single lowercase token"
                )));
            }
        }
        for tag in &self.tags {
            if !tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
                return Err(RuntimeError::SkillParse(format!(
                    "tag '{tag}' must match [a-z0-9-]+"
                )));
            }
        }
        Ok(())
    }

    pub fn deduped_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .filter(|t| seen.insert((*t).clone()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeMetadata {
    #[serde(default)]
    pub requires: RequiresSpec,
    #[serde(default)]
    pub egress_domains: Vec<String>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
    #[serde(default)]
    pub timeout_hint: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiresSpec {
    #[serde(default)]
    pub bins: Vec<String>,
    #[serde(default)]
    pub env: EnvRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvRequirements {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default, rename = "one_of")]
    pub one_of: Vec<Vec<String>>,
    #[serde(default)]
    pub optional: Vec<String>,
}

/// One `## Tool: <name>` entry, or a legacy shorthand name-only entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub description: String,
    pub input_spec: Option<String>,
    pub output_spec: Option<String>,
    pub output_format: Option<String>,
    /// Full entry body including its heading, for prompt construction.
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct SkillDocument {
    pub frontmatter: Frontmatter,
    pub entries: Vec<SkillEntry>,
}

/// Parse a full SKILL.md document: frontmatter plus `## Tool:` entries.
pub fn parse_skill_document(content: &str) -> Result<SkillDocument> {
    let (frontmatter, body) = extract_frontmatter(content)?;
    frontmatter.validate()?;
    let entries = parse_entries(&body);
    Ok(SkillDocument { frontmatter, entries })
}

fn extract_frontmatter(content: &str) -> Result<(Frontmatter, String)> {
    let content = content.trim_start();
    if !content.starts_with("---") {
        return Ok((Frontmatter::default(), content.to_string()));
    }
    let after_first = &content[3..];
    let end = after_first
        .find("\n---")
        .ok_or_else(|| RuntimeError::SkillParse("opening --- with no closing ---".into()))?;
    let yaml = after_first[..end].trim();
    let body_start = 3 + end + 4;
    let body = content.get(body_start..).unwrap_or("").trim_start().to_string();
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)
        .map_err(|e| RuntimeError::SkillParse(format!("invalid frontmatter: {e}")))?;
    Ok((frontmatter, body))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Input,
    Output,
    OutputFormat,
}

/// Per-source-line accumulator. A line "belongs" to a field only if the
/// very first inline event on that line is a `**Label:**` strong span
/// matching one of the three recognized labels; otherwise its text joins
/// the entry description. Mirrors the line-oriented field grammar from the
/// catalog format while walking real markdown inlines instead of raw text.
#[derive(Default)]
struct LineAccum {
    label: Option<FieldKind>,
    text: String,
    at_start: bool,
}

impl LineAccum {
    fn new() -> Self {
        Self { at_start: true, ..Default::default() }
    }
}

fn commit_line(line: LineAccum, entry: Option<&mut SkillEntry>) {
    let Some(entry) = entry else { return };
    let text = line.text.trim();
    if text.is_empty() {
        return;
    }
    match line.label {
        Some(FieldKind::Input) => entry.input_spec = Some(text.to_string()),
        Some(FieldKind::Output) => entry.output_spec = Some(text.to_string()),
        Some(FieldKind::OutputFormat) => entry.output_format = Some(text.to_string()),
        None => {
            if !entry.description.is_empty() {
                entry.description.push(' ');
            }
            entry.description.push_str(text);
        }
    }
}

/// Closes the currently open entry (if any), slicing its raw `body` text
/// from `start` to `end` out of `source`.
fn close_entry(current: &mut Option<SkillEntry>, entries: &mut Vec<SkillEntry>, start: usize, end: usize, source: &str) {
    if let Some(mut entry) = current.take() {
        if !entry.name.is_empty() {
            entry.body = source[start..end].trim_end().to_string();
            entries.push(entry);
        }
    }
}

/// Walks the body as a `pulldown_cmark` event stream implementing the entry
/// grammar: `## Tool: <name>` opens an entry; any other heading closes the
/// current one; `**Input:**` / `**Output:**` / `**Output format:**` lines
/// populate fields; everything else accumulates into the description. At
/// top level (no open entry), a bare `- <token>` list item with no spaces
/// and at most 64 characters is a legacy name-only entry.
fn parse_entries(body: &str) -> Vec<SkillEntry> {
    let mut entries = Vec::new();
    let mut current: Option<SkillEntry> = None;
    let mut entry_start = 0usize;

    let mut heading_level: Option<HeadingLevel> = None;
    let mut heading_text = String::new();
    let mut heading_start = 0usize;

    let mut line = LineAccum::new();
    let mut strong_buf: Option<String> = None;
    let mut strong_is_candidate = false;

    let mut in_item = false;
    let mut item_text = String::new();
    let mut item_start = 0usize;

    for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                commit_line(std::mem::replace(&mut line, LineAccum::new()), current.as_mut());
                heading_level = Some(level);
                heading_text.clear();
                heading_start = range.start;
            }
            Event::End(TagEnd::Heading(_)) => {
                let level = heading_level.take();
                let heading = heading_text.trim();
                let tool_name = matches!(level, Some(HeadingLevel::H2)).then(|| heading.strip_prefix("Tool:")).flatten();
                if let Some(name) = tool_name {
                    close_entry(&mut current, &mut entries, entry_start, heading_start, body);
                    let name = name.trim();
                    if !name.is_empty() {
                        entry_start = heading_start;
                        current = Some(SkillEntry { name: name.to_string(), ..Default::default() });
                    }
                } else {
                    close_entry(&mut current, &mut entries, entry_start, heading_start, body);
                }
            }
            Event::Start(Tag::Paragraph) => {
                line = LineAccum::new();
            }
            Event::End(TagEnd::Paragraph) => {
                commit_line(std::mem::replace(&mut line, LineAccum::new()), current.as_mut());
            }
            Event::SoftBreak | Event::HardBreak => {
                commit_line(std::mem::replace(&mut line, LineAccum::new()), current.as_mut());
            }
            Event::Start(Tag::Strong) => {
                strong_buf = Some(String::new());
                strong_is_candidate = line.at_start;
            }
            Event::End(TagEnd::Strong) => {
                if let Some(label) = strong_buf.take() {
                    if strong_is_candidate && line.label.is_none() {
                        line.label = match label.trim() {
                            "Input:" => Some(FieldKind::Input),
                            "Output:" => Some(FieldKind::Output),
                            "Output format:" => Some(FieldKind::OutputFormat),
                            _ => {
                                line.text.push_str(&label);
                                None
                            }
                        };
                    } else {
                        line.text.push_str(&label);
                    }
                    line.at_start = false;
                }
            }
            Event::Start(Tag::Item) if current.is_none() => {
                in_item = true;
                item_text.clear();
                item_start = range.start;
            }
            Event::End(TagEnd::Item) if in_item => {
                in_item = false;
                let token = item_text.trim();
                if !token.is_empty() && !token.contains(' ') && token.chars().count() <= 64 {
                    entries.push(SkillEntry {
                        name: token.to_string(),
                        body: body[item_start..range.end].trim_end().to_string(),
                        ..Default::default()
                    });
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if heading_level.is_some() {
                    heading_text.push_str(&text);
                } else if let Some(buf) = strong_buf.as_mut() {
                    buf.push_str(&text);
                } else if in_item {
                    item_text.push_str(&text);
                } else {
                    line.text.push_str(&text);
                    line.at_start = false;
                }
            }
            _ => {}
        }
    }

    commit_line(line, current.as_mut());
    close_entry(&mut current, &mut entries, entry_start, body.len(), body);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_without_frontmatter() {
        let doc = parse_skill_document("# Catalog\n\n## Tool: get\nFetches a thing.\n**Input:** id\n**Output:** json\n").unwrap();
        assert_eq!(doc.entries.len(), 1);
        let entry = &doc.entries[0];
        assert_eq!(entry.name, "get");
        assert_eq!(entry.description, "Fetches a thing.");
        assert_eq!(entry.input_spec.as_deref(), Some("id"));
        assert_eq!(entry.output_spec.as_deref(), Some("json"));
    }

    #[test]
    fn other_heading_closes_entry() {
        let doc = parse_skill_document("## Tool: get\nDescribes get.\n## Notes\nIgnored text.\n").unwrap();
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].description, "Describes get.");
    }

    #[test]
    fn legacy_shorthand_list_item_creates_name_only_entry() {
        let doc = parse_skill_document("- get\n- set\nnot a list item\n").unwrap();
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].name, "get");
        assert!(doc.entries[0].description.is_empty());
    }

    #[test]
    fn legacy_shorthand_rejects_multi_word_items() {
        let doc = parse_skill_document("- get the thing\n").unwrap();
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn parses_frontmatter_and_forge_namespace() {
        let content = r#"---
name: kubernetes
description: Manage clusters
category: infra
tags: [k8s, cloud]
metadata:
  forge:
    requires:
      bins: [kubectl]
      env:
        required: [KUBECONFIG]
    egress_domains: ["*.amazonaws.com"]
    timeout_hint: 60
  other_tool:
    anything: goes
---
## Tool: get
Gets pods.
"#;
        let doc = parse_skill_document(content).unwrap();
        assert_eq!(doc.frontmatter.name.as_deref(), Some("kubernetes"));
        let forge = doc.frontmatter.forge().unwrap().unwrap();
        assert_eq!(forge.requires.bins, vec!["kubectl"]);
        assert_eq!(forge.timeout_hint, Some(60));
        assert!(doc.frontmatter.metadata.contains_key("other_tool"));
    }

    #[test]
    fn rejects_category_with_spaces() {
        let content = "---\nname: x\ncategory: bad category\n---\nbody\n";
        assert!(parse_skill_document(content).is_err());
    }

    #[test]
    fn rejects_tag_with_underscore() {
        let content = "---\nname: x\ntags: [bad_tag]\n---\nbody\n";
        assert!(parse_skill_document(content).is_err());
    }
}
