// src/types.rs

//! Plain data shared by the watcher, scheduler and pipeline.

use std::fmt;
use std::time::{Duration, Instant};

/// Monotonically increasing revision number reported by a content source.
pub type Version = u64;

/// Stable identity of a resolved content source.
///
/// Used as the per-source directory name under the data directory, so it is
/// always a filesystem-safe token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to build one version of the content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildRequest {
    pub version: Version,
    pub requested_at: Instant,
}

impl BuildRequest {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            requested_at: Instant::now(),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub version: Version,
    pub success: bool,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn succeeded(version: Version, duration: Duration) -> Self {
        Self {
            version,
            success: true,
            duration: Some(duration),
            error: None,
        }
    }

    pub fn failed(version: Version, error: impl fmt::Display) -> Self {
        Self {
            version,
            success: false,
            duration: None,
            error: Some(error.to_string()),
        }
    }
}

/// Version of a source that has never been written; there is nothing to build.
pub const EMPTY_VERSION: Version = 0;
