use anyhow::Context;
use cirun_core::config::{ConfigWarning, RunnerConfig, WarnLevel};
use cirun_core::matrix::expand;
use std::path::Path;

use crate::output::print_json;

pub fn run(root: &Path, manifest: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = RunnerConfig::load(root).context("failed to load runner config")?;
    let mut warnings: Vec<ConfigWarning> = config.validate();

    let (_, path, manifest) = super::load_manifest(root, manifest)?;
    warnings.extend(manifest.lint().iter().cloned());
    let jobs = expand(&manifest).len();

    if json {
        let value = serde_json::json!({
            "manifest": path,
            "jobs": jobs,
            "warnings": warnings,
        });
        print_json(&value)?;
    } else {
        println!("{}: {jobs} job(s)", path.display());
        if warnings.is_empty() {
            println!("Manifest is valid. No warnings.");
        }
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("validation found errors");
    }
    Ok(())
}
