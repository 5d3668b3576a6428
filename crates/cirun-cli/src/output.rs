use cirun_core::executor::ExecutionResult;
use cirun_core::report::PipelineReport;
use serde::Serialize;

/// Lines of captured output shown per failing command.
const FAILURE_TAIL_LINES: usize = 40;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

/// One line per finished job, printed as results arrive.
pub fn print_progress(result: &ExecutionResult) {
    let mark = if result.passed() { "ok  " } else { "FAIL" };
    println!(
        "[{mark}] {} in {}",
        result.label,
        format_duration(result.duration_ms)
    );
}

/// Summary table, then the diagnostics of every failed job.
pub fn print_report(report: &PipelineReport) {
    println!();
    let rows = report
        .jobs
        .iter()
        .map(|j| {
            vec![
                format!("#{}", j.number),
                j.stage.clone(),
                j.runtime.clone(),
                j.status.to_string(),
                format_duration(j.duration_ms),
            ]
        })
        .collect();
    print_table(&["JOB", "STAGE", "RUNTIME", "STATUS", "DURATION"], rows);

    for job in report.failures() {
        print_failure(job);
    }
    for job in &report.jobs {
        for phase in job.cleanup_failures() {
            let detail = phase
                .failed_command()
                .map(|c| format!("'{}'", c.command))
                .or_else(|| phase.note.clone())
                .unwrap_or_default();
            println!("warning: {} {} failed: {detail}", job.label, phase.phase);
        }
    }

    println!();
    let prefix = if report.dry_run { "[dry run] " } else { "" };
    println!(
        "{prefix}Pipeline {}: {} passed, {} failed ({} total) in {}",
        report.status,
        report.passed(),
        report.failed(),
        report.jobs.len(),
        format_duration(report.duration_ms().max(0) as u64)
    );
}

fn print_failure(job: &ExecutionResult) {
    println!();
    let Some(phase) = job.failing_phase() else {
        println!("{} failed", job.label);
        return;
    };
    println!("{} failed in {} ({})", job.label, phase.phase, phase.status);
    if let Some(cmd) = phase.failed_command() {
        println!("  $ {}", cmd.command);
        let lines: Vec<&str> = cmd.output.lines().collect();
        let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
        for line in &lines[start..] {
            println!("  | {line}");
        }
    }
}
