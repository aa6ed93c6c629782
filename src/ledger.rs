// src/ledger.rs

//! Durable record of the last successfully built version.
//!
//! One record per content source. The file backend keeps a single integer in
//! `<data_dir>/<source id>/version` and replaces it by writing a temporary
//! file in the same directory and renaming it over the old one, so a reader
//! sees either the previous marker or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::{Result, RevbuildError};
use crate::types::{SourceId, Version};

/// File name of the marker inside a source's data directory.
pub const MARKER_FILE_NAME: &str = "version";

/// Abstract storage for the version marker.
///
/// Implementations must never let the stored value decrease.
pub trait VersionLedger: Send + Sync {
    fn load(&self) -> Result<Option<Version>>;
    fn store(&mut self, version: Version) -> Result<()>;
}

/// Whether `version` is worth building given the current marker.
pub fn is_actionable(marker: Option<Version>, version: Version) -> bool {
    marker.is_none_or(|m| version > m)
}

fn check_not_lowering(current: Option<Version>, version: Version) -> Result<()> {
    match current {
        Some(current) if version < current => Err(RevbuildError::LedgerError(format!(
            "refusing to lower marker from {current} to {version}"
        ))),
        _ => Ok(()),
    }
}

/// Stores the marker in a file, replaced atomically on every write.
#[derive(Debug)]
pub struct FileLedger {
    source_id: SourceId,
    path: PathBuf,
}

impl FileLedger {
    /// Ledger for `source_id` whose marker lives in `source_dir`.
    pub fn new(source_id: SourceId, source_dir: &Path) -> Self {
        Self {
            source_id,
            path: source_dir.join(MARKER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VersionLedger for FileLedger {
    fn load(&self) -> Result<Option<Version>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            RevbuildError::LedgerError(format!("reading {}: {e}", self.path.display()))
        })?;

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        trimmed.parse::<Version>().map(Some).map_err(|e| {
            RevbuildError::LedgerError(format!(
                "marker {} holds '{trimmed}', not a version: {e}",
                self.path.display()
            ))
        })
    }

    fn store(&mut self, version: Version) -> Result<()> {
        let current = self.load()?;
        check_not_lowering(current, version)?;
        if current == Some(version) {
            debug!(source = %self.source_id, version, "marker already at version");
            return Ok(());
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| {
            RevbuildError::LedgerError(format!("creating {}: {e}", dir.display()))
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
            RevbuildError::LedgerError(format!("creating temp marker in {}: {e}", dir.display()))
        })?;
        writeln!(tmp, "{version}")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| RevbuildError::LedgerError(format!("writing temp marker: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            RevbuildError::LedgerError(format!("replacing {}: {}", self.path.display(), e.error))
        })?;

        info!(source = %self.source_id, version, "stored version marker (file)");
        Ok(())
    }
}

/// Keeps the marker in memory only (lost on restart).
///
/// Also remembers every stored value, which tests use to check the marker's
/// history.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    current: Option<Version>,
    history: Vec<Version>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(version: Version) -> Self {
        Self {
            current: Some(version),
            history: vec![version],
        }
    }

    pub fn history(&self) -> &[Version] {
        &self.history
    }
}

impl VersionLedger for MemoryLedger {
    fn load(&self) -> Result<Option<Version>> {
        Ok(self.current)
    }

    fn store(&mut self, version: Version) -> Result<()> {
        check_not_lowering(self.current, version)?;
        self.current = Some(version);
        self.history.push(version);
        info!(version, "stored version marker (memory)");
        Ok(())
    }
}
