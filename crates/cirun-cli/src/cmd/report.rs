use anyhow::Context;
use cirun_core::report::PipelineReport;
use std::path::Path;

use crate::output::{print_json, print_report};

pub fn run(root: &Path, run_id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let report = match run_id {
        Some(id) => PipelineReport::load(root, id),
        None => PipelineReport::load_latest(root),
    }
    .context("failed to load report")?;

    if json {
        return print_json(&report);
    }
    println!(
        "Run {} of {} at {}",
        report.run_id,
        report.manifest.display(),
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    print_report(&report);
    Ok(())
}
