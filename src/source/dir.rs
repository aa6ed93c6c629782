// src/source/dir.rs

//! Local directory content source.
//!
//! Layout: every version is a numerically named subdirectory of the root,
//! holding the full tree as of that version:
//!
//! ```text
//! <root>/
//! ├── 1/
//! ├── 2/
//! └── 3/   <- current version
//! ```
//!
//! Changes below the root are observed with `notify`; each create, modify or
//! remove event becomes one [`SourceUpdate`] carrying the version visible at
//! that moment. Access events are dropped.
//!
//! A version directory must appear atomically: write it elsewhere on the same
//! filesystem and rename it into `<root>/N`. A tree still being filled in when
//! the debounce window closes is built as-is, and later requests for the same
//! `N` are skipped as already built.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::errors::{Result, RevbuildError};
use crate::fs::{mirror_dir, Equality};
use crate::source::{ContentSource, SourceResolver, SourceUpdate};
use crate::types::{SourceId, Version};

/// Content source backed by a local directory of numbered version trees.
pub struct DirectorySource {
    id: SourceId,
    root: PathBuf,
    /// Kept alive for as long as the source exists; dropping it stops events.
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for DirectorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySource")
            .field("id", &self.id)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl DirectorySource {
    pub fn open(id: SourceId, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root: root.into(),
            watcher: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Highest numerically named subdirectory of `root`, or 0 when there is none.
pub fn latest_version(root: &Path) -> std::io::Result<Version> {
    let mut latest = 0;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(v) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<Version>().ok())
        {
            latest = latest.max(v);
        }
    }
    Ok(latest)
}

/// Only creations, modifications and removals can change what a version holds.
/// Reads of the tree (including our own `read_dir`) raise access events and
/// must not count as updates.
fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

impl ContentSource for DirectorySource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn current_version(&self) -> Version {
        latest_version(&self.root).unwrap_or_else(|e| {
            warn!(root = ?self.root, error = %e, "cannot list source versions");
            0
        })
    }

    fn subscribe(&self, updates: mpsc::UnboundedSender<SourceUpdate>) -> Result<()> {
        let root = self.root.clone();

        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if !is_content_change(&event.kind) => {
                    trace!(kind = ?event.kind, "ignoring non-mutating source event");
                }
                Ok(event) => {
                    let version = latest_version(&root).unwrap_or(0);
                    debug!(kind = ?event.kind, version, "source change observed");
                    if let Err(err) = updates.send(SourceUpdate { version }) {
                        debug!("dropping source update; receiver gone: {err}");
                    }
                }
                Err(err) => warn!("source watch error: {err}"),
            },
            Config::default(),
        )
        .map_err(anyhow::Error::from)?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(anyhow::Error::from)?;
        info!(root = ?self.root, "watching content source for updates");

        let mut slot = self
            .watcher
            .lock()
            .map_err(|_| anyhow!("source watcher mutex poisoned"))?;
        *slot = Some(watcher);
        Ok(())
    }

    fn fetch_snapshot(&self, version: Version, dest: &Path) -> Result<()> {
        let src = self.root.join(version.to_string());
        if !src.is_dir() {
            return Err(RevbuildError::DownloadError {
                version,
                reason: format!("version tree {} is not available", src.display()),
            });
        }

        let stats = mirror_dir(&src, dest, Equality::Contents).map_err(|e| {
            RevbuildError::DownloadError {
                version,
                reason: format!("{e:#}"),
            }
        })?;
        info!(
            version,
            copied = stats.copied,
            deleted = stats.deleted,
            unchanged = stats.unchanged,
            "snapshot synced"
        );
        Ok(())
    }

    fn join_network(&self) -> Result<()> {
        debug!(source = %self.id, "directory source has no network to join");
        Ok(())
    }
}

/// Resolves a filesystem path to a [`DirectorySource`].
///
/// The identity is the blake3 digest of the canonical path, so different
/// spellings of the same directory share state.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryResolver;

impl DirectoryResolver {
    pub fn identity_for(canonical_root: &Path) -> SourceId {
        let digest = blake3::hash(canonical_root.to_string_lossy().as_bytes());
        SourceId::new(digest.to_hex().to_string())
    }
}

impl SourceResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ContentSource>> {
        let root = Path::new(name)
            .canonicalize()
            .map_err(|e| RevbuildError::ResolutionError {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if !root.is_dir() {
            return Err(RevbuildError::ResolutionError {
                name: name.to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let id = Self::identity_for(&root);
        info!(source = %id, root = ?root, "resolved content source");
        Ok(Arc::new(DirectorySource::open(id, root)))
    }
}
