//! Result aggregation and saved reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{CirunError, Result};
use crate::executor::ExecutionResult;
use crate::io::atomic_write;
use crate::paths;
use crate::types::JobStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub manifest: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
    #[serde(default)]
    pub dry_run: bool,
    pub jobs: Vec<ExecutionResult>,
}

impl PipelineReport {
    /// Roll results up into one report. The aggregate fails iff any instance
    /// failed; input order does not matter, results are stored by job number.
    pub fn aggregate(
        manifest: impl Into<PathBuf>,
        started_at: DateTime<Utc>,
        mut results: Vec<ExecutionResult>,
    ) -> Self {
        results.sort_by_key(|r| r.number);
        let status = aggregate_status(&results);
        Self {
            run_id: Uuid::new_v4(),
            manifest: manifest.into(),
            started_at,
            finished_at: Utc::now(),
            status,
            dry_run: false,
            jobs: results,
        }
    }

    pub fn passed(&self) -> usize {
        self.jobs.iter().filter(|j| j.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.passed()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.jobs.iter().filter(|j| !j.passed())
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write `<run-id>.json` and `latest.json`, then prune old reports beyond
    /// `keep` (`0` keeps everything).
    pub fn save(&self, root: &Path, keep: usize) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(self)?;
        let path = paths::report_path(root, &self.run_id.to_string());
        atomic_write(&path, &data)?;
        atomic_write(&paths::latest_report_path(root), &data)?;
        if keep > 0 {
            prune(root, keep)?;
        }
        Ok(path)
    }

    pub fn load_latest(root: &Path) -> Result<Self> {
        Self::load_file(&paths::latest_report_path(root))
    }

    pub fn load(root: &Path, run_id: &str) -> Result<Self> {
        Self::load_file(&paths::report_path(root, run_id))
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CirunError::ReportNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

pub fn aggregate_status(results: &[ExecutionResult]) -> JobStatus {
    if results.iter().all(|r| r.passed()) {
        JobStatus::Passed
    } else {
        JobStatus::Failed
    }
}

/// Drop the oldest per-run reports so at most `keep` remain. `latest.json` is
/// never pruned.
fn prune(root: &Path, keep: usize) -> Result<()> {
    let dir = paths::reports_dir(root);
    let mut reports: Vec<(std::time::SystemTime, PathBuf)> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "json")
                && p.file_name().is_some_and(|n| n != paths::LATEST_REPORT)
        })
        .filter_map(|p| {
            let modified = p.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .collect();
    if reports.len() <= keep {
        return Ok(());
    }
    reports.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in reports.into_iter().skip(keep) {
        tracing::debug!(path = %path.display(), "pruning report");
        std::fs::remove_file(path)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
