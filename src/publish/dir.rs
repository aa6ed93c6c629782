// src/publish/dir.rs

//! Publishing into a local directory.
//!
//! The target directory is kept as a mirror of the staging tree. Files are
//! compared by size only; entries missing from staging are removed. The
//! address names the directory plus a blake3 digest of the published
//! manifest (relative path and size of every entry).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, RevbuildError};
use crate::fs::{mirror_dir, scan_tree, EntryKind, Equality, TreeListing};
use crate::publish::{PublishReport, PublishTarget, Publisher};

#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    target_dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }
}

impl Publisher for DirectoryPublisher {
    fn provision(&self, staging: &Path) -> Result<Box<dyn PublishTarget>> {
        fs::create_dir_all(&self.target_dir).map_err(|e| {
            RevbuildError::PublishError(format!(
                "creating publish dir {}: {e}",
                self.target_dir.display()
            ))
        })?;
        let target_dir = self.target_dir.canonicalize()?;
        debug!(?staging, ?target_dir, "directory publish target ready");

        Ok(Box::new(DirectoryTarget {
            staging: staging.to_path_buf(),
            target_dir,
            digest: None,
        }))
    }
}

#[derive(Debug)]
pub struct DirectoryTarget {
    staging: PathBuf,
    target_dir: PathBuf,
    digest: Option<blake3::Hash>,
}

impl DirectoryTarget {
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }
}

impl PublishTarget for DirectoryTarget {
    fn sync(&mut self) -> Result<PublishReport> {
        // The staging path is a link that the pipeline redirects; resolve it
        // once so the whole sync reads a single tree.
        let resolved = self.staging.canonicalize().map_err(|e| {
            RevbuildError::PublishError(format!(
                "resolving staging {}: {e}",
                self.staging.display()
            ))
        })?;

        let stats = mirror_dir(&resolved, &self.target_dir, Equality::SizeOnly)
            .map_err(|e| RevbuildError::PublishError(format!("{e:#}")))?;

        let listing = scan_tree(&self.target_dir)
            .map_err(|e| RevbuildError::PublishError(format!("{e:#}")))?;
        self.digest = Some(manifest_digest(&listing));

        Ok(PublishReport {
            address: self.address(),
            copied: stats.copied,
            deleted: stats.deleted,
            unchanged: stats.unchanged,
        })
    }

    fn address(&self) -> String {
        match self.digest {
            Some(digest) => format!("dir+{}#{}", self.target_dir.display(), digest.to_hex()),
            None => format!("dir+{}", self.target_dir.display()),
        }
    }
}

/// Digest over the sorted `(path, kind, size)` manifest of a tree.
pub fn manifest_digest(listing: &TreeListing) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for (rel, kind) in listing {
        hasher.update(rel.to_string_lossy().as_bytes());
        match kind {
            EntryKind::Dir => hasher.update(b"\0d\n"),
            EntryKind::File { size } => {
                hasher.update(b"\0f");
                hasher.update(&size.to_le_bytes());
                hasher.update(b"\n")
            }
        };
    }
    hasher.finalize()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        tree: PathBuf,
        staging: PathBuf,
        publish: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let tree = tmp.path().join("outputs/1");
        fs::create_dir_all(&tree).unwrap();
        let staging = tmp.path().join("staging");
        std::os::unix::fs::symlink(&tree, &staging).unwrap();
        Fixture {
            tree,
            staging,
            publish: tmp.path().join("publish"),
            _tmp: tmp,
        }
    }

    #[test]
    fn sync_mirrors_through_the_staging_link() {
        let f = fixture();
        fs::write(f.tree.join("index.html"), "hello").unwrap();

        let mut target = DirectoryPublisher::new(&f.publish).provision(&f.staging).unwrap();
        let report = target.sync().unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(fs::read_to_string(f.publish.join("index.html")).unwrap(), "hello");
        assert!(report.address.starts_with("dir+"));
        assert!(report.address.contains('#'));
    }

    #[test]
    fn entries_missing_from_staging_are_removed() {
        let f = fixture();
        fs::create_dir_all(&f.publish).unwrap();
        fs::write(f.publish.join("stale.html"), "old").unwrap();
        fs::write(f.tree.join("fresh.html"), "new").unwrap();

        let mut target = DirectoryPublisher::new(&f.publish).provision(&f.staging).unwrap();
        let report = target.sync().unwrap();

        assert_eq!(report.deleted, 1);
        assert!(!f.publish.join("stale.html").exists());
    }

    #[test]
    fn address_changes_only_when_the_manifest_does() {
        let f = fixture();
        fs::write(f.tree.join("a.txt"), "one").unwrap();
        let mut target = DirectoryPublisher::new(&f.publish).provision(&f.staging).unwrap();

        let first = target.sync().unwrap().address;
        assert_eq!(target.sync().unwrap().address, first);

        fs::write(f.tree.join("b.txt"), "two").unwrap();
        assert_ne!(target.sync().unwrap().address, first);
    }
}
