//! Local store for `cache.directories`.
//!
//! Layout: `<store>/<runtime>/<slot>/...` where `<runtime>` is the sanitized
//! runtime version and `<slot>` the sanitized expanded directory path plus a
//! short hash of that path, so distinct directories never share a slot.
//! Restore copies a snapshot into place; save replaces the snapshot with the
//! directory's current contents, leaving the store itself out when the cached
//! directory contains it. Parallel instances on the same runtime race on save
//! and the last writer wins.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CirunError, Result};
use crate::io;
use crate::paths::sanitize_component;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub runtime: String,
    pub slot: String,
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, runtime: &str, dir: &Path) -> PathBuf {
        self.root.join(sanitize_component(runtime)).join(slot_name(dir))
    }

    /// Copy the stored snapshot for `dir` into `dir`. Returns the number of
    /// files restored; `0` when nothing is stored.
    pub fn restore(&self, runtime: &str, dir: &Path) -> Result<usize> {
        let slot = self.slot_path(runtime, dir);
        if !slot.is_dir() {
            return Ok(0);
        }
        io::ensure_dir(dir)?;
        copy_tree(&slot, dir, None)
    }

    /// Replace the stored snapshot for `dir`. Returns the number of files
    /// saved; `0` and no change when `dir` does not exist.
    pub fn save(&self, runtime: &str, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let slot = self.slot_path(runtime, dir);
        let parent = slot
            .parent()
            .ok_or_else(|| CirunError::Cache(format!("bad cache slot {}", slot.display())))?;
        io::ensure_dir(parent)?;

        // Canonical paths, so a store inside `dir` is recognised and skipped.
        let store = fs::canonicalize(&self.root)?;
        let src = fs::canonicalize(dir)?;

        // Build the new snapshot next to the old one, then swap it in.
        let staging = tempfile::TempDir::new_in(parent)?;
        let copied = copy_tree(&src, staging.path(), Some(&store))?;
        swap_in(staging.path(), &slot)?;
        Ok(copied)
    }

    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            return Ok(out);
        }
        for runtime in sorted_dirs(&self.root)? {
            for slot in sorted_dirs(&runtime)? {
                let (files, bytes) = measure(&slot);
                out.push(CacheEntry {
                    runtime: file_name(&runtime),
                    slot: file_name(&slot),
                    files,
                    bytes,
                });
            }
        }
        Ok(out)
    }

    /// Delete the whole store. Returns true if anything was removed.
    pub fn clear(&self) -> Result<bool> {
        io::remove_dir_if_exists(&self.root)
    }
}

/// Attempts at replacing a slot another save keeps re-creating.
const SWAP_ATTEMPTS: usize = 5;

/// Move a finished snapshot onto `slot`. A parallel save can land its own
/// snapshot between the remove and the rename; retrying keeps the later
/// writer's snapshot.
fn swap_in(staging: &Path, slot: &Path) -> Result<()> {
    let mut attempt = 1;
    loop {
        let res = io::remove_dir_if_exists(slot)
            .and_then(|_| fs::rename(staging, slot).map_err(CirunError::from));
        match res {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= SWAP_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::debug!(slot = %slot.display(), attempt, "cache slot swap retried: {e}");
                attempt += 1;
            }
        }
    }
}

/// `<sanitized path>-<12 hex chars of sha256(path)>`.
fn slot_name(dir: &Path) -> String {
    let raw = dir.to_string_lossy();
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    format!("{}-{}", sanitize_component(&raw), &digest[..12])
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn measure(dir: &Path) -> (usize, u64) {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .fold((0, 0), |(files, bytes), e| {
            let len = e.metadata().map(|m| m.len()).unwrap_or(0);
            (files + 1, bytes + len)
        })
}

/// Copy every file under `src` into `dst`, creating directories as needed and
/// overwriting existing files. Symlinks are recreated, not followed. Anything
/// under `skip` is left out.
fn copy_tree(src: &Path, dst: &Path, skip: Option<&Path>) -> Result<usize> {
    let mut count = 0usize;
    let walk = WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| skip.map_or(true, |s| !e.path().starts_with(s)));
    for entry in walk.filter_map(|e| e.ok()) {
        let p = entry.path();
        let rel = p.strip_prefix(src).map_err(|_| {
            CirunError::Cache(format!(
                "path {} is not under {}",
                p.display(),
                src.display()
            ))
        })?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            io::ensure_dir(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(p, &target)?;
            count += 1;
        } else {
            if let Some(parent) = target.parent() {
                io::ensure_dir(parent)?;
            }
            fs::copy(p, &target)?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    if target.symlink_metadata().is_ok() {
        fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
