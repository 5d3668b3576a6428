use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle phases of a job instance, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RestoreCache,
    BeforeInstall,
    Install,
    Script,
    AfterFailure,
    AfterSuccess,
    SaveCache,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::RestoreCache,
            Phase::BeforeInstall,
            Phase::Install,
            Phase::Script,
            Phase::AfterFailure,
            Phase::AfterSuccess,
            Phase::SaveCache,
        ]
    }

    /// Phases whose failure fails the job.
    pub fn mandatory() -> &'static [Phase] {
        &[Phase::BeforeInstall, Phase::Install, Phase::Script]
    }

    /// Phases that carry shell commands in the manifest.
    pub fn scripted() -> &'static [Phase] {
        &[
            Phase::BeforeInstall,
            Phase::Install,
            Phase::Script,
            Phase::AfterFailure,
            Phase::AfterSuccess,
        ]
    }

    pub fn is_mandatory(self) -> bool {
        Phase::mandatory().contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::RestoreCache => "restore_cache",
            Phase::BeforeInstall => "before_install",
            Phase::Install => "install",
            Phase::Script => "script",
            Phase::AfterFailure => "after_failure",
            Phase::AfterSuccess => "after_success",
            Phase::SaveCache => "save_cache",
        }
    }

    /// Look up a scripted phase by its manifest key.
    pub fn from_manifest_key(key: &str) -> Option<Phase> {
        Phase::scripted().iter().copied().find(|p| p.as_str() == key)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhaseStatus {
    Passed,
    /// `exit_code` is `None` when the command was killed or never started.
    Failed { exit_code: Option<i32> },
    Skipped,
}

impl PhaseStatus {
    pub fn is_failed(self) -> bool {
        matches!(self, PhaseStatus::Failed { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::Passed => "passed",
            PhaseStatus::Failed { .. } => "failed",
            PhaseStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::Failed {
                exit_code: Some(code),
            } => write!(f, "failed ({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed,
}

impl JobStatus {
    pub fn is_passed(self) -> bool {
        self == JobStatus::Passed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Passed => "passed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
