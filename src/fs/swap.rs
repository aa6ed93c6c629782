// src/fs/swap.rs

//! Atomic redirection of the "live" output pointer.
//!
//! The live location is a symlink. A new symlink is created under a
//! temporary name next to it and renamed over the old one; `rename(2)`
//! replaces the link in one step, so readers resolve either the previous
//! tree or the new one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Move the freshly built `output_dir` under `outputs_dir`, point `live_link`
/// at it and delete superseded trees.
///
/// The tree that was live before the swap is kept until the next promotion,
/// so a reader that resolved the link earlier can finish its walk.
///
/// Returns the directory the live link now resolves to. `output_dir` no
/// longer exists afterwards.
pub fn promote_output(
    output_dir: &Path,
    outputs_dir: &Path,
    live_link: &Path,
    label: &str,
) -> Result<PathBuf> {
    if !output_dir.is_dir() {
        anyhow::bail!("build produced no output directory at {:?}", output_dir);
    }

    fs::create_dir_all(outputs_dir).with_context(|| format!("creating {:?}", outputs_dir))?;
    let dest = unique_child(outputs_dir, label);

    fs::rename(output_dir, &dest)
        .with_context(|| format!("moving {:?} to {:?}", output_dir, dest))?;
    let dest = dest
        .canonicalize()
        .with_context(|| format!("canonicalizing {:?}", dest))?;

    let previous = fs::canonicalize(live_link).ok();
    replace_link(live_link, &dest)?;
    info!(live = ?live_link, target = ?dest, "live output pointer redirected");

    let mut keep = vec![dest.clone()];
    keep.extend(previous);
    prune_except(outputs_dir, &keep);
    Ok(dest)
}

/// Where `live_link` currently points, if anywhere.
pub fn live_target(live_link: &Path) -> Option<PathBuf> {
    fs::read_link(live_link).ok()
}

fn unique_child(dir: &Path, label: &str) -> PathBuf {
    let mut candidate = dir.join(label);
    let mut n = 1;
    while fs::symlink_metadata(&candidate).is_ok() {
        candidate = dir.join(format!("{label}.{n}"));
        n += 1;
    }
    candidate
}

#[cfg(unix)]
fn replace_link(live_link: &Path, target: &Path) -> Result<()> {
    let parent = live_link
        .parent()
        .with_context(|| format!("{:?} has no parent directory", live_link))?;
    let file_name = live_link
        .file_name()
        .with_context(|| format!("{:?} has no file name", live_link))?
        .to_string_lossy();
    let tmp_link = parent.join(format!(".{file_name}.next"));

    match fs::remove_file(&tmp_link) {
        Ok(()) => debug!(?tmp_link, "removed leftover temporary link"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {:?}", tmp_link)),
    }

    // A real directory cannot be replaced by rename; clear it first.
    if let Ok(meta) = fs::symlink_metadata(live_link) {
        if meta.is_dir() {
            warn!(?live_link, "live location is a plain directory; replacing it");
            fs::remove_dir_all(live_link)
                .with_context(|| format!("removing {:?}", live_link))?;
        }
    }

    std::os::unix::fs::symlink(target, &tmp_link)
        .with_context(|| format!("creating link {:?} -> {:?}", tmp_link, target))?;
    fs::rename(&tmp_link, live_link)
        .with_context(|| format!("renaming {:?} over {:?}", tmp_link, live_link))?;
    Ok(())
}

// Without POSIX rename-over-symlink the swap degrades to remove + link, which
// leaves a short window with no live tree.
#[cfg(windows)]
fn replace_link(live_link: &Path, target: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(live_link) {
        if meta.file_type().is_symlink() {
            fs::remove_dir(live_link)
        } else {
            fs::remove_dir_all(live_link)
        }
        .with_context(|| format!("removing {:?}", live_link))?;
    }
    std::os::windows::fs::symlink_dir(target, live_link)
        .with_context(|| format!("creating link {:?} -> {:?}", live_link, target))?;
    Ok(())
}

fn prune_except(outputs_dir: &Path, keep: &[PathBuf]) {
    let entries = match fs::read_dir(outputs_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = ?outputs_dir, error = %e, "cannot list old outputs for pruning");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let kept = path
            .canonicalize()
            .map(|p| keep.contains(&p))
            .unwrap_or(false);
        if kept {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => debug!(?path, "pruned superseded output"),
            Err(e) => warn!(?path, error = %e, "failed to prune superseded output"),
        }
    }
}
