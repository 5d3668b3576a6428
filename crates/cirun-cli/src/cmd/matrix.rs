use cirun_core::matrix::expand_with_env;
use std::path::Path;

use crate::output::{print_json, print_table};

pub fn run(root: &Path, manifest: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (config, _path, manifest) = super::load_manifest(root, manifest)?;
    let instances = expand_with_env(&manifest, &config.env);

    if json {
        return print_json(&instances);
    }

    let rows = instances
        .iter()
        .map(|i| {
            let env: Vec<String> = i.user_env().map(|(k, v)| format!("{k}={v}")).collect();
            vec![
                format!("#{}", i.number),
                i.stage.clone(),
                i.runtime.clone(),
                i.name.clone().unwrap_or_default(),
                env.join(" "),
            ]
        })
        .collect();
    print_table(&["JOB", "STAGE", "RUNTIME", "NAME", "ENV"], rows);
    Ok(())
}
