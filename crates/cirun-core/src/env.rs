//! Environment variables for job instances: parsing Travis-style
//! `NAME=value` assignment strings and `$VAR` expansion in cache paths.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::ParseError;

/// Ordered variable map. Later inserts of the same name replace the value but
/// keep the original position.
pub type EnvVars = IndexMap<String, String>;

static ASSIGN_RE: OnceLock<Regex> = OnceLock::new();
static VAR_RE: OnceLock<Regex> = OnceLock::new();

fn assign_re() -> &'static Regex {
    ASSIGN_RE.get_or_init(|| {
        Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)=(?:"([^"]*)"|'([^']*)'|(\S*))(?:\s+|$)"#)
            .expect("static regex")
    })
}

fn var_re() -> &'static Regex {
    VAR_RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("static regex")
    })
}

/// Parse a line of whitespace-separated assignments such as
/// `PART=unit PYTEST_ARGS="-x -q"` into `vars`.
pub fn parse_assignments(line: &str, field: &str, vars: &mut EnvVars) -> Result<(), ParseError> {
    let mut rest = line.trim();
    while !rest.is_empty() {
        let caps = assign_re()
            .captures(rest)
            .ok_or_else(|| ParseError::InvalidField {
                field: field.to_string(),
                reason: format!("expected NAME=value, found '{rest}'"),
            })?;
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        vars.insert(caps[1].to_string(), value.to_string());
        let consumed = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        rest = rest[consumed..].trim_start();
    }
    Ok(())
}

/// Expand `$NAME` and `${NAME}` using `lookup`. Unknown names expand to the
/// empty string, as in a POSIX shell.
pub fn expand_vars<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var_re()
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

/// Expand a cache directory string against the instance environment, then the
/// process environment. A leading `~` means the home directory.
pub fn expand_path(raw: &str, vars: &EnvVars) -> PathBuf {
    let home = || home::home_dir().map(|p| p.to_string_lossy().into_owned());
    let lookup = |name: &str| {
        vars.get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
            .or_else(|| if name == "HOME" { home() } else { None })
    };
    let expanded = expand_vars(raw, lookup);
    if expanded == "~" {
        if let Some(h) = home() {
            return PathBuf::from(h);
        }
    }
    if let Some(rest) = expanded.strip_prefix("~/") {
        if let Some(h) = home() {
            return PathBuf::from(h).join(rest);
        }
    }
    PathBuf::from(expanded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
