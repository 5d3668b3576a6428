pub mod cache;
pub mod matrix;
pub mod report;
pub mod run;
pub mod validate;

use anyhow::Context;
use cirun_core::{config::RunnerConfig, manifest::Manifest, paths, CirunError};
use std::path::{Path, PathBuf};

use run::RunExit;

/// Exit code for a failed command: the code a `RunExit` carries, `2` for a
/// manifest that does not parse, `1` otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<RunExit>() {
        return exit.exit_code();
    }
    let parse_failed = err
        .chain()
        .any(|e| matches!(e.downcast_ref::<CirunError>(), Some(CirunError::Parse(_))));
    if parse_failed {
        2
    } else {
        1
    }
}

/// Runner config plus the manifest it points at. An `explicit` path from the
/// command line is relative to the current directory.
pub fn load_manifest(
    root: &Path,
    explicit: Option<&Path>,
) -> anyhow::Result<(RunnerConfig, PathBuf, Manifest)> {
    let config = RunnerConfig::load(root).context("failed to load runner config")?;
    let path = match explicit {
        Some(p) => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            paths::resolve(&cwd, p)
        }
        None => config.manifest_path(root),
    };
    let manifest = Manifest::load(&path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    Ok((config, path, manifest))
}
