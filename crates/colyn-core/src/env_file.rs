//! Dotenv-style environment files
//!
//! Reads are forgiving (a missing or unreadable file is an empty map).
//! Updates rewrite only the keys they are given and leave every other
//! line of the file, comments included, exactly as it was.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ColynError;

/// Key holding the dev-server port
pub const PORT_KEY: &str = "PORT";

/// Key holding the worktree ID (or `main`)
pub const WORKTREE_KEY: &str = "WORKTREE";

/// `WORKTREE` value of the main checkout
pub const MAIN_WORKTREE_VALUE: &str = "main";

/// Read an environment file into a key/value map
pub fn read_env_file(path: &Path) -> BTreeMap<String, String> {
    match fs::read_to_string(path) {
        Ok(content) => parse_env(&content),
        Err(_) => BTreeMap::new(),
    }
}

/// Parse dotenv content into a key/value map
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(parse_line)
        .map(|line| (line.key.to_string(), line.value))
        .collect()
}

/// Set `updates` in the file at `path`, creating it when absent
///
/// Existing assignments of an updated key are rewritten in place (an
/// `export ` prefix is kept); keys not yet present are appended in the
/// order given.
pub fn update_env_file(path: &Path, updates: &[(&str, String)]) -> Result<(), ColynError> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    fs::write(path, apply_updates(&existing, updates))?;
    Ok(())
}

/// Pure form of [`update_env_file`]
pub fn apply_updates(content: &str, updates: &[(&str, String)]) -> String {
    let mut written = vec![false; updates.len()];
    let mut out = String::with_capacity(content.len() + 32);

    for raw in content.lines() {
        let replacement = parse_line(raw).and_then(|line| {
            updates
                .iter()
                .position(|(key, _)| *key == line.key)
                .map(|idx| (idx, line.exported))
        });
        match replacement {
            Some((idx, exported)) => {
                let (key, value) = &updates[idx];
                let prefix = if exported { "export " } else { "" };
                out.push_str(&format!("{}{}={}", prefix, key, format_value(value)));
                written[idx] = true;
            }
            None => out.push_str(raw),
        }
        out.push('\n');
    }

    for ((key, value), done) in updates.iter().zip(written) {
        if !done {
            out.push_str(&format!("{}={}\n", key, format_value(value)));
        }
    }

    out
}

struct EnvLine<'a> {
    key: &'a str,
    value: String,
    exported: bool,
}

fn parse_line(raw: &str) -> Option<EnvLine<'_>> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (exported, line) = match line.strip_prefix("export ") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }

    Some(EnvLine {
        key,
        value: parse_value(value.trim()),
        exported,
    })
}

fn parse_value(value: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                let inner = &rest[..end];
                return if quote == '"' {
                    inner.replace("\\n", "\n").replace("\\\"", "\"")
                } else {
                    inner.to_string()
                };
            }
        }
    }

    // Unquoted: a ` #` starts a trailing comment
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn format_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '#' || c == '"' || c == '\'');
    if needs_quotes && !value.is_empty() {
        format!(
            "\"{}\"",
            value.replace('"', "\\\"").replace('\n', "\\n")
        )
    } else {
        value.to_string()
    }
}
