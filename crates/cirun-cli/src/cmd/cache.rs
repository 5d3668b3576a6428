use anyhow::Context;
use clap::Subcommand;
use cirun_core::{cache::CacheStore, config::RunnerConfig};
use std::path::Path;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// List cached directories per runtime
    List,

    /// Delete the whole cache store
    Clear,
}

pub fn run(root: &Path, subcmd: CacheSubcommand, json: bool) -> anyhow::Result<()> {
    let config = RunnerConfig::load(root).context("failed to load runner config")?;
    let store = CacheStore::new(config.cache_root(root));
    match subcmd {
        CacheSubcommand::List => list(&store, json),
        CacheSubcommand::Clear => clear(&store, json),
    }
}

fn list(store: &CacheStore, json: bool) -> anyhow::Result<()> {
    let entries = store.entries().context("failed to read cache store")?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("Cache is empty ({}).", store.root().display());
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.runtime.clone(),
                e.slot.clone(),
                e.files.to_string(),
                e.bytes.to_string(),
            ]
        })
        .collect();
    print_table(&["RUNTIME", "DIRECTORY", "FILES", "BYTES"], rows);
    Ok(())
}

fn clear(store: &CacheStore, json: bool) -> anyhow::Result<()> {
    let removed = store.clear().context("failed to clear cache store")?;
    if json {
        print_json(&serde_json::json!({ "cleared": removed }))?;
    } else if removed {
        println!("Cleared {}.", store.root().display());
    } else {
        println!("Cache is already empty.");
    }
    Ok(())
}
