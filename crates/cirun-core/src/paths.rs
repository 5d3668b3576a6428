use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CIRUN_DIR: &str = ".cirun";
pub const CONFIG_FILE: &str = ".cirun/config.yaml";
pub const REPORTS_DIR: &str = ".cirun/reports";
pub const CACHE_DIR: &str = ".cirun/cache";

pub const DEFAULT_MANIFEST: &str = ".travis.yml";
pub const LATEST_REPORT: &str = "latest.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    root.join(REPORTS_DIR)
}

pub fn report_path(root: &Path, run_id: &str) -> PathBuf {
    reports_dir(root).join(format!("{run_id}.json"))
}

pub fn latest_report_path(root: &Path) -> PathBuf {
    reports_dir(root).join(LATEST_REPORT)
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// ---------------------------------------------------------------------------
// Key sanitizing
// ---------------------------------------------------------------------------

static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();

fn unsafe_re() -> &'static Regex {
    UNSAFE_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Turn an arbitrary string (a runtime version, an absolute path) into a single
/// filesystem-safe path component.
pub fn sanitize_component(raw: &str) -> String {
    let replaced = unsafe_re().replace_all(raw.trim_matches('/'), "_");
    let trimmed = replaced.trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
