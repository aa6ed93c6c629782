// src/fs/mirror.rs

//! Full mirror sync of one directory tree onto another.
//!
//! After [`mirror_dir`] returns `Ok`, the destination holds exactly the
//! entries of the source: missing entries are added, differing files are
//! replaced and entries absent from the source are deleted. Each file is
//! written to a temporary sibling and renamed into place, so a reader never
//! sees a half-copied file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// What a relative path refers to inside a scanned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File { size: u64 },
}

/// Relative path -> entry kind, ordered so parents precede children.
pub type TreeListing = BTreeMap<PathBuf, EntryKind>;

/// How two regular files with the same relative path are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    /// Equal iff byte sizes match. Modification times are ignored.
    SizeOnly,
    /// Equal iff sizes match and the contents hash the same.
    Contents,
}

/// Work needed to make a destination match a source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorPlan {
    /// Destination entries to remove (absent from source, or of the wrong kind).
    pub delete: Vec<PathBuf>,
    /// Directories to create, parents first.
    pub create_dirs: Vec<PathBuf>,
    /// Files to copy from source to destination.
    pub copy: Vec<PathBuf>,
}

impl MirrorPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create_dirs.is_empty() && self.copy.is_empty()
    }
}

/// Summary of an applied mirror.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: usize,
    pub deleted: usize,
    pub dirs_created: usize,
    pub unchanged: usize,
}

/// List every directory and regular file below `root`.
///
/// A missing root is an empty tree. Symlinks inside the tree are skipped.
pub fn scan_tree(root: &Path) -> Result<TreeListing> {
    let mut listing = TreeListing::new();
    if !root.exists() {
        return Ok(listing);
    }

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("walking {:?}", root))?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativizing {:?}", entry.path()))?
            .to_path_buf();

        let file_type = entry.file_type();
        if file_type.is_dir() {
            listing.insert(rel, EntryKind::Dir);
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .with_context(|| format!("reading metadata of {:?}", entry.path()))?
                .len();
            listing.insert(rel, EntryKind::File { size });
        } else {
            debug!(path = ?entry.path(), "skipping non-regular entry");
        }
    }

    Ok(listing)
}

/// Compute the plan that turns `dst` into a copy of `src`.
///
/// `files_equal` is only consulted for file/file pairs whose sizes match;
/// directories are always considered equal.
pub fn plan_mirror<F>(src: &TreeListing, dst: &TreeListing, mut files_equal: F) -> MirrorPlan
where
    F: FnMut(&Path) -> bool,
{
    let mut plan = MirrorPlan::default();

    for (rel, src_kind) in src {
        match (src_kind, dst.get(rel)) {
            (EntryKind::Dir, Some(EntryKind::Dir)) => {}
            (EntryKind::Dir, other) => {
                if other.is_some() {
                    plan.delete.push(rel.clone());
                }
                plan.create_dirs.push(rel.clone());
            }
            (EntryKind::File { size }, Some(EntryKind::File { size: dst_size })) => {
                if size != dst_size || !files_equal(rel) {
                    plan.copy.push(rel.clone());
                }
            }
            (EntryKind::File { .. }, other) => {
                if other.is_some() {
                    plan.delete.push(rel.clone());
                }
                plan.copy.push(rel.clone());
            }
        }
    }

    for rel in dst.keys() {
        if !src.contains_key(rel) && !has_deleted_ancestor(rel, &plan.delete) {
            plan.delete.push(rel.clone());
        }
    }

    plan
}

fn has_deleted_ancestor(rel: &Path, deleted: &[PathBuf]) -> bool {
    rel.ancestors()
        .skip(1)
        .any(|a| deleted.iter().any(|d| d.as_path() == a))
}

/// Mirror `src` onto `dst`, creating `dst` if needed.
pub fn mirror_dir(src: &Path, dst: &Path, equality: Equality) -> Result<MirrorStats> {
    if !src.is_dir() {
        anyhow::bail!("mirror source {:?} is not a directory", src);
    }
    fs::create_dir_all(dst).with_context(|| format!("creating {:?}", dst))?;

    let src_listing = scan_tree(src)?;
    let dst_listing = scan_tree(dst)?;

    let plan = plan_mirror(&src_listing, &dst_listing, |rel| match equality {
        Equality::SizeOnly => true,
        Equality::Contents => same_contents(&src.join(rel), &dst.join(rel)).unwrap_or(false),
    });

    let unchanged = src_listing
        .iter()
        .filter(|(_, kind)| matches!(kind, EntryKind::File { .. }))
        .count()
        - plan.copy.len();

    apply_plan(src, dst, &plan)?;

    let stats = MirrorStats {
        copied: plan.copy.len(),
        deleted: plan.delete.len(),
        dirs_created: plan.create_dirs.len(),
        unchanged,
    };
    debug!(?src, ?dst, ?stats, "mirror complete");
    Ok(stats)
}

fn apply_plan(src: &Path, dst: &Path, plan: &MirrorPlan) -> Result<()> {
    for rel in &plan.delete {
        remove_entry(&dst.join(rel))?;
    }

    for rel in &plan.create_dirs {
        let path = dst.join(rel);
        fs::create_dir_all(&path).with_context(|| format!("creating {:?}", path))?;
    }

    for rel in &plan.copy {
        copy_file_atomic(&src.join(rel), &dst.join(rel))?;
    }

    Ok(())
}

fn remove_entry(path: &Path) -> Result<()> {
    let res = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match res {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {:?}", path)),
    }
}

/// Copy `from` to `to` through a temporary file in `to`'s directory.
pub fn copy_file_atomic(from: &Path, to: &Path) -> Result<()> {
    let parent = to
        .parent()
        .with_context(|| format!("{:?} has no parent directory", to))?;
    fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {:?}", parent))?;
    let mut reader = fs::File::open(from).with_context(|| format!("opening {:?}", from))?;
    io::copy(&mut reader, tmp.as_file_mut())
        .with_context(|| format!("copying {:?} to {:?}", from, to))?;

    // Temp files are created 0600; carry the source mode across.
    let permissions = reader
        .metadata()
        .with_context(|| format!("reading metadata of {:?}", from))?
        .permissions();
    tmp.as_file()
        .set_permissions(permissions)
        .with_context(|| format!("setting permissions on {:?}", tmp.path()))?;
    tmp.persist(to)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming into {:?}", to))?;
    Ok(())
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    Ok(hash_file(a)? == hash_file(b)?)
}

/// blake3 digest of a file's contents.
pub fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut file = fs::File::open(path).with_context(|| format!("opening {:?}", path))?;
    io::copy(&mut file, &mut hasher).with_context(|| format!("hashing {:?}", path))?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: &[(&str, Option<u64>)]) -> TreeListing {
        entries
            .iter()
            .map(|(p, size)| {
                let kind = match size {
                    Some(size) => EntryKind::File { size: *size },
                    None => EntryKind::Dir,
                };
                (PathBuf::from(p), kind)
            })
            .collect()
    }

    #[test]
    fn plan_adds_updates_and_deletes() {
        let src = listing(&[("a.txt", Some(3)), ("d", None), ("d/b.txt", Some(5))]);
        let dst = listing(&[("a.txt", Some(4)), ("old.txt", Some(1))]);

        let plan = plan_mirror(&src, &dst, |_| true);
        assert_eq!(plan.create_dirs, vec![PathBuf::from("d")]);
        assert_eq!(
            plan.copy,
            vec![PathBuf::from("a.txt"), PathBuf::from("d/b.txt")]
        );
        assert_eq!(plan.delete, vec![PathBuf::from("old.txt")]);
    }

    #[test]
    fn plan_replaces_entries_of_the_wrong_kind() {
        let src = listing(&[("x", Some(1))]);
        let dst = listing(&[("x", None), ("x/inner.txt", Some(2))]);

        let plan = plan_mirror(&src, &dst, |_| true);
        assert_eq!(plan.delete, vec![PathBuf::from("x")]);
        assert_eq!(plan.copy, vec![PathBuf::from("x")]);
    }

    #[test]
    fn same_size_files_defer_to_equality_callback() {
        let src = listing(&[("same.txt", Some(3))]);
        let dst = listing(&[("same.txt", Some(3))]);

        assert!(plan_mirror(&src, &dst, |_| true).is_empty());
        assert_eq!(plan_mirror(&src, &dst, |_| false).copy.len(), 1);
    }

    #[test]
    fn mirror_dir_reconciles_trees_on_disk() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("keep.txt"), "same").unwrap();
        fs::write(src.path().join("sub/new.txt"), "fresh").unwrap();
        fs::write(dst.path().join("keep.txt"), "old!").unwrap();
        fs::write(dst.path().join("gone.txt"), "bye").unwrap();

        let stats = mirror_dir(src.path(), dst.path(), Equality::Contents).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("keep.txt")).unwrap(), "same");
        assert_eq!(
            fs::read_to_string(dst.path().join("sub/new.txt")).unwrap(),
            "fresh"
        );
        assert!(!dst.path().join("gone.txt").exists());
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.deleted, 1);
    }

    #[test]
    fn size_only_mirror_keeps_same_size_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("page.html"), "new").unwrap();
        fs::write(dst.path().join("page.html"), "old").unwrap();

        let stats = mirror_dir(src.path(), dst.path(), Equality::SizeOnly).unwrap();

        assert_eq!(stats.copied, 0);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(fs::read_to_string(dst.path().join("page.html")).unwrap(), "old");
    }

    #[cfg(unix)]
    #[test]
    fn mirrored_files_keep_their_mode() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let script = src.path().join("run.sh");
        let page = src.path().join("index.html");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::write(&page, "<p>hi</p>").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&page, fs::Permissions::from_mode(0o644)).unwrap();

        mirror_dir(src.path(), dst.path(), Equality::Contents).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dst.path().join("run.sh")), 0o755);
        assert_eq!(mode(&dst.path().join("index.html")), 0o644);
    }

    #[test]
    fn missing_source_is_an_error() {
        let dst = tempfile::tempdir().unwrap();
        let missing = dst.path().join("nope");
        assert!(mirror_dir(&missing, dst.path(), Equality::Contents).is_err());
    }
}
