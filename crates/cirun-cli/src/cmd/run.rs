use anyhow::Context;
use chrono::Utc;
use clap::Args;
use cirun_core::{
    cache::CacheStore,
    executor::Executor,
    matrix::{expand_with_env, Selection},
    pool::run_all,
    report::PipelineReport,
    shell::{CommandRunner, DryRunner, ShellRunner},
    types::JobStatus,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::output::{print_json, print_progress, print_report};

// ---------------------------------------------------------------------------
// RunExit: typed non-zero exit codes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    PipelineFailed { failed: usize, total: usize },
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::PipelineFailed { .. } => 1,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::PipelineFailed { failed, total } => {
                write!(f, "pipeline failed: {failed} of {total} job(s) failed")
            }
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Manifest path (default: from config, else .travis.yml)
    #[arg(long, short = 'm')]
    pub manifest: Option<PathBuf>,

    /// Jobs to run at once (default: from config, else 1). Parallel jobs
    /// share the project directory as their working directory.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Only run jobs in this stage
    #[arg(long)]
    pub stage: Option<String>,

    /// Only run jobs on this runtime version
    #[arg(long)]
    pub runtime: Option<String>,

    /// Only run the job with this number (repeatable)
    #[arg(long = "job", value_name = "N")]
    pub numbers: Vec<usize>,

    /// Print what would run without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip cache restore and save
    #[arg(long)]
    pub no_cache: bool,

    /// Per-command timeout in seconds (0 = none; default: from config)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let (config, manifest_path, manifest) = super::load_manifest(root, args.manifest.as_deref())?;
    for warning in manifest.lint() {
        tracing::warn!("{}", warning.message);
    }

    let selection = Selection {
        stage: args.stage,
        runtime: args.runtime,
        numbers: args.numbers,
    };
    let instances = selection.apply(expand_with_env(&manifest, &config.env));
    if instances.is_empty() {
        anyhow::bail!("no jobs match the selection");
    }

    let timeout_secs = args.timeout.unwrap_or(config.command_timeout_seconds);
    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    let runner: Box<dyn CommandRunner> = if args.dry_run {
        Box::new(DryRunner)
    } else {
        Box::new(ShellRunner::new(config.resolved_shell()).with_timeout(timeout))
    };

    let mut executor = Executor::new(runner, root).with_language(manifest.language_or_default());
    if !args.no_cache && !args.dry_run && manifest.cache.is_enabled() {
        executor = executor.with_cache(CacheStore::new(config.cache_root(root)));
    }

    let workers = args.jobs.unwrap_or(config.jobs);
    if workers == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }

    if !json {
        println!(
            "Running {} job(s) from {} with {} worker(s)",
            instances.len(),
            manifest_path.display(),
            workers.min(instances.len())
        );
    }

    let started = Utc::now();
    let results = run_all(&executor, &instances, workers, |result| {
        if !json {
            print_progress(result);
        }
    });

    let mut report = PipelineReport::aggregate(&manifest_path, started, results);
    report.dry_run = args.dry_run;

    if !args.dry_run {
        let saved = report
            .save(root, config.keep_reports)
            .context("failed to save report")?;
        tracing::info!(path = %saved.display(), "report saved");
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.status == JobStatus::Failed {
        return Err(RunExit::PipelineFailed {
            failed: report.failed(),
            total: report.jobs.len(),
        }
        .into());
    }
    Ok(())
}
