use cirun_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `CIRUN_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.cirun/` or the default manifest
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> PathBuf {
    let marked = |dir: &Path| {
        dir.join(paths::CIRUN_DIR).is_dir() || dir.join(paths::DEFAULT_MANIFEST).is_file()
    };
    if let Some(dir) = start.ancestors().find(|d| marked(d)) {
        return dir.to_path_buf();
    }
    if let Some(dir) = start.ancestors().find(|d| d.join(".git").is_dir()) {
        return dir.to_path_buf();
    }
    start.to_path_buf()
}
