//! Phase executor: runs one job instance through its lifecycle.
//!
//! Order: restore_cache → before_install → install → script → after hook →
//! save_cache. A failed mandatory phase skips the remaining mandatory phases.
//! The after hook is `after_failure` when any mandatory phase failed and
//! `after_success` otherwise; it runs every command and never changes the job
//! status. Cache phases are best-effort in the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

use crate::cache::CacheStore;
use crate::env::expand_path;
use crate::matrix::JobInstance;
use crate::shell::{CommandOutcome, CommandRunner};
use crate::types::{JobStatus, Phase, PhaseStatus};

// ---------------------------------------------------------------------------
// PhaseOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PhaseOutcome {
    fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Skipped,
            commands: Vec::new(),
            note: None,
        }
    }

    /// The command that failed the phase, if any.
    pub fn failed_command(&self) -> Option<&CommandOutcome> {
        self.commands.iter().find(|c| !c.passed())
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub number: usize,
    pub label: String,
    pub stage: String,
    pub runtime: String,
    pub status: JobStatus,
    pub phases: Vec<PhaseOutcome>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    fn start(instance: &JobInstance, label: String) -> Self {
        Self {
            number: instance.number,
            label,
            stage: instance.stage.clone(),
            runtime: instance.runtime.clone(),
            status: JobStatus::Passed,
            phases: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    fn record(&mut self, outcome: PhaseOutcome) {
        if outcome.phase.is_mandatory() && outcome.status.is_failed() {
            self.status = JobStatus::Failed;
        }
        self.phases.push(outcome);
    }

    pub fn passed(&self) -> bool {
        self.status.is_passed()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Whether any command of `phase` was started.
    pub fn ran(&self, phase: Phase) -> bool {
        self.phase(phase).is_some_and(|p| !p.commands.is_empty())
    }

    /// The mandatory phase that failed the job.
    pub fn failing_phase(&self) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|p| p.phase.is_mandatory() && p.status.is_failed())
    }

    /// Failures in after hooks and cache phases.
    pub fn cleanup_failures(&self) -> impl Iterator<Item = &PhaseOutcome> {
        self.phases
            .iter()
            .filter(|p| !p.phase.is_mandatory() && p.status.is_failed())
    }

    /// Equality of everything the commands determined: statuses, exit codes,
    /// output. Timings and start time are ignored.
    pub fn same_outcome(&self, other: &ExecutionResult) -> bool {
        fn strip(r: &ExecutionResult) -> Vec<PhaseOutcome> {
            r.phases
                .iter()
                .cloned()
                .map(|mut p| {
                    for c in &mut p.commands {
                        c.duration_ms = 0;
                    }
                    p
                })
                .collect()
        }
        self.number == other.number
            && self.status == other.status
            && strip(self) == strip(other)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    runner: Box<dyn CommandRunner>,
    cache: Option<CacheStore>,
    workdir: PathBuf,
    language: String,
}

impl Executor {
    pub fn new(runner: Box<dyn CommandRunner>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            cache: None,
            workdir: workdir.into(),
            language: "python".to_string(),
        }
    }

    /// Enable cache restore/save against `store`.
    pub fn with_cache(mut self, store: CacheStore) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn run(&self, instance: &JobInstance) -> ExecutionResult {
        let started = Instant::now();
        let label = instance.label(&self.language);
        tracing::info!(job = instance.number, %label, "job started");
        let mut result = ExecutionResult::start(instance, label);

        if let Some(outcome) = self.cache_phase(Phase::RestoreCache, instance) {
            result.record(outcome);
        }

        for &phase in Phase::mandatory() {
            let commands = instance.phases.get(phase);
            if commands.is_empty() {
                continue;
            }
            if !result.passed() {
                result.record(PhaseOutcome::skipped(phase));
                continue;
            }
            let outcome = self.run_phase(phase, commands, instance, true);
            if outcome.status.is_failed() {
                tracing::info!(job = instance.number, %phase, "phase failed");
            }
            result.record(outcome);
        }

        let hook = if result.passed() {
            Phase::AfterSuccess
        } else {
            Phase::AfterFailure
        };
        let commands = instance.phases.get(hook);
        if !commands.is_empty() {
            let outcome = self.run_phase(hook, commands, instance, false);
            if outcome.status.is_failed() {
                tracing::warn!(job = instance.number, phase = %hook, "cleanup hook failed");
            }
            result.record(outcome);
        }

        if let Some(outcome) = self.cache_phase(Phase::SaveCache, instance) {
            result.record(outcome);
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            job = instance.number,
            status = %result.status,
            duration_ms = result.duration_ms,
            "job finished"
        );
        result
    }

    /// Run `commands` in order. With `stop_on_failure` the first failing
    /// command ends the phase; otherwise every command runs and the first
    /// failure decides the status.
    fn run_phase(
        &self,
        phase: Phase,
        commands: &[String],
        instance: &JobInstance,
        stop_on_failure: bool,
    ) -> PhaseOutcome {
        let mut outcomes = Vec::with_capacity(commands.len());
        let mut status = PhaseStatus::Passed;
        for command in commands {
            let outcome = self.runner.run(command, &self.workdir, &instance.env);
            let passed = outcome.passed();
            if !passed && !status.is_failed() {
                status = PhaseStatus::Failed {
                    exit_code: outcome.exit_code,
                };
            }
            outcomes.push(outcome);
            if !passed && stop_on_failure {
                break;
            }
        }
        PhaseOutcome {
            phase,
            status,
            commands: outcomes,
            note: None,
        }
    }

    fn cache_phase(&self, phase: Phase, instance: &JobInstance) -> Option<PhaseOutcome> {
        let store = self.cache.as_ref()?;
        if instance.cache_dirs.is_empty() {
            return None;
        }

        let mut files = 0usize;
        let mut errors = Vec::new();
        for raw in &instance.cache_dirs {
            let dir = crate::paths::resolve(&self.workdir, &expand_path(raw, &instance.env));
            let res = match phase {
                Phase::RestoreCache => store.restore(&instance.runtime, &dir),
                _ => store.save(&instance.runtime, &dir),
            };
            match res {
                Ok(n) => files += n,
                Err(e) => {
                    tracing::warn!(job = instance.number, %phase, dir = %dir.display(), "cache error: {e}");
                    errors.push(format!("{}: {e}", dir.display()));
                }
            }
        }

        let verb = if phase == Phase::RestoreCache {
            "restored"
        } else {
            "saved"
        };
        let mut note = format!(
            "{verb} {files} file(s) across {} director{}",
            instance.cache_dirs.len(),
            if instance.cache_dirs.len() == 1 { "y" } else { "ies" }
        );
        let status = if errors.is_empty() {
            PhaseStatus::Passed
        } else {
            note.push_str("; ");
            note.push_str(&errors.join("; "));
            PhaseStatus::Failed { exit_code: None }
        };
        Some(PhaseOutcome {
            phase,
            status,
            commands: Vec::new(),
            note: Some(note),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
