//! Dotenv-style environment file loading and `${VAR}` expansion.
//!
//! Grounded in `manifest.rs`'s `expand_env_vars` (character-by-character,
//! brace-depth tracked) and its directory-scan loading style, generalized to
//! the standalone environment file format of the external interfaces: a
//! `KEY=VALUE` line per entry, `#` starts a comment, and `# KEY=<encrypted>`
//! documents a key that lives in the encrypted secrets file rather than here.

use crate::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// A single parsed line from an environment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFileEntry {
    /// `KEY=VALUE`
    Assignment(String, String),
    /// `# KEY=<encrypted>` — documents a secret-backed key, not a literal value.
    SecretPlaceholder(String),
}

/// Parse dotenv-style content into an ordered list of entries.
///
/// Lines are `KEY=VALUE`; a leading `#` marks a comment, except for the
/// `# KEY=<encrypted>` placeholder form, which is recognized specially so
/// callers can tell "secret lives elsewhere" apart from "commented out".
pub fn parse_env_file(content: &str) -> Vec<EnvFileEntry> {
    let mut entries = Vec::new();
    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            let rest = rest.trim();
            if let Some((key, value)) = rest.split_once('=') {
                if value.trim() == "<encrypted>" {
                    entries.push(EnvFileEntry::SecretPlaceholder(key.trim().to_string()));
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            entries.push(EnvFileEntry::Assignment(
                key.trim().to_string(),
                value.trim().to_string(),
            ));
        }
    }
    entries
}

/// Load an environment file and overlay its assignments into the process
/// environment without overriding keys that are already set (runner
/// orchestration step 1).
pub fn overlay_process_env(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut applied = HashMap::new();
    if !path.exists() {
        return Ok(applied);
    }
    let content = std::fs::read_to_string(path)?;
    for entry in parse_env_file(&content) {
        if let EnvFileEntry::Assignment(key, value) = entry {
            if std::env::var_os(&key).is_none() {
                std::env::set_var(&key, &value);
                applied.insert(key, value);
            }
        }
    }
    Ok(applied)
}

/// Expand `${VAR}`, `${VAR:-default}`, and `${VAR:?error}` references in a
/// string against the process environment. Character-by-character with
/// brace-depth tracking so nested `${...}` inside a default value resolves
/// correctly.
pub fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && i + 1 < chars.len() && chars[i + 1] == '{' {
            let start = i + 2;
            let mut depth = 1;
            let mut j = start;
            while j < chars.len() && depth > 0 {
                match chars[j] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth == 0 {
                    break;
                }
                j += 1;
            }
            if depth != 0 {
                // Unbalanced braces: emit literally and stop scanning this run.
                out.push_str(&chars[i..].iter().collect::<String>());
                return Ok(out);
            }
            let inner: String = chars[start..j].iter().collect();
            out.push_str(&resolve_var_expr(&inner)?);
            i = j + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn resolve_var_expr(expr: &str) -> Result<String, ConfigError> {
    if let Some(idx) = expr.find(":-") {
        let (name, default) = (&expr[..idx], &expr[idx + 2..]);
        return Ok(std::env::var(name).unwrap_or_else(|_| default.to_string()));
    }
    if let Some(idx) = expr.find(":?") {
        let (name, message) = (&expr[..idx], &expr[idx + 2..]);
        return std::env::var(name)
            .map_err(|_| ConfigError::MissingEnvVar(name.to_string(), message.to_string()));
    }
    std::env::var(expr).map_err(|_| {
        ConfigError::MissingEnvVar(expr.to_string(), format!("environment variable {} is not set", expr))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments_and_comments() {
        let content = "API_KEY=abc123\n# a full comment\n# DB_PASSWORD=<encrypted>\n\nMODE=prod\n";
        let entries = parse_env_file(content);
        assert_eq!(
            entries,
            vec![
                EnvFileEntry::Assignment("API_KEY".into(), "abc123".into()),
                EnvFileEntry::SecretPlaceholder("DB_PASSWORD".into()),
                EnvFileEntry::Assignment("MODE".into(), "prod".into()),
            ]
        );
    }

    #[test]
    fn expands_plain_reference() {
        std::env::set_var("FORGE_TEST_EXPAND_PLAIN", "value1");
        assert_eq!(expand_env_vars("${FORGE_TEST_EXPAND_PLAIN}").unwrap(), "value1");
    }

    #[test]
    fn expands_default_when_unset() {
        std::env::remove_var("FORGE_TEST_EXPAND_MISSING");
        assert_eq!(
            expand_env_vars("${FORGE_TEST_EXPAND_MISSING:-fallback}").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn errors_with_message_when_required_and_unset() {
        std::env::remove_var("FORGE_TEST_EXPAND_REQUIRED");
        let err = expand_env_vars("${FORGE_TEST_EXPAND_REQUIRED:?must set it}").unwrap_err();
        match err {
            ConfigError::MissingEnvVar(name, msg) => {
                assert_eq!(name, "FORGE_TEST_EXPAND_REQUIRED");
                assert_eq!(msg, "must set it");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn overlay_never_overrides_existing_keys() {
        std::env::set_var("FORGE_TEST_OVERLAY_KEY", "original");
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "FORGE_TEST_OVERLAY_KEY=overwritten\n").unwrap();
        overlay_process_env(&path).unwrap();
        assert_eq!(std::env::var("FORGE_TEST_OVERLAY_KEY").unwrap(), "original");
    }
}
