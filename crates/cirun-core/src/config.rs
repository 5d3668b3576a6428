use crate::env::EnvVars;
use crate::error::{CirunError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RunnerConfig
// ---------------------------------------------------------------------------

/// Local runner settings from `.cirun/config.yaml`. Every field is optional;
/// a missing file means all defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Manifest path, relative to the project root.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    /// Interpreter that receives each command as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Number of instances run at once.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Per-command timeout. `0` means no timeout.
    #[serde(default)]
    pub command_timeout_seconds: u64,
    /// Cache store location, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Extra variables for every instance, applied before manifest env.
    #[serde(default, skip_serializing_if = "EnvVars::is_empty")]
    pub env: EnvVars,
    /// Saved reports to keep, newest first. `0` keeps all.
    #[serde(default = "default_keep_reports")]
    pub keep_reports: usize,
}

fn default_manifest() -> PathBuf {
    PathBuf::from(paths::DEFAULT_MANIFEST)
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_jobs() -> usize {
    1
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(paths::CACHE_DIR)
}

fn default_keep_reports() -> usize {
    20
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            shell: default_shell(),
            jobs: default_jobs(),
            command_timeout_seconds: 0,
            cache_dir: default_cache_dir(),
            env: EnvVars::new(),
            keep_reports: default_keep_reports(),
        }
    }
}

impl RunnerConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: RunnerConfig = serde_yaml::from_str(&data)
            .map_err(|e| CirunError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Ok(cfg)
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.manifest)
    }

    pub fn cache_root(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.cache_dir)
    }

    /// The configured shell if it is on `PATH`, else `sh`.
    pub fn resolved_shell(&self) -> String {
        if which::which(&self.shell).is_ok() {
            self.shell.clone()
        } else {
            tracing::debug!(shell = %self.shell, "configured shell not found, using sh");
            "sh".to_string()
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.shell.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "shell is empty".to_string(),
            });
        } else if which::which(&self.shell).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("shell '{}' not found on PATH; commands will run with sh", self.shell),
            });
        }

        if self.jobs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "jobs must be at least 1".to_string(),
            });
        } else if self.jobs > 64 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("jobs={} (>64 is unusual for a local machine)", self.jobs),
            });
        }

        for name in self.env.keys() {
            if name.is_empty() || name.contains('=') {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid variable name '{name}' in env"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
