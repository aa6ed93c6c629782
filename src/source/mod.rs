// src/source/mod.rs

//! Content source abstraction.
//!
//! A content source is a versioned, replicated tree. revbuild only needs to
//! know its identity and current version, be told when it changes, and be
//! able to copy out the tree as of one version. The replication transport
//! itself lives behind these traits; [`dir`] provides a local directory
//! implementation.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{SourceId, Version};

pub mod dir;

pub use dir::{DirectoryResolver, DirectorySource};

/// Raw update notification from a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUpdate {
    /// Version observed when the notification was produced.
    pub version: Version,
}

/// Handle to an opened content source.
///
/// Methods may block on IO; async callers run them on the blocking pool.
pub trait ContentSource: Send + Sync {
    /// Stable identity of the source.
    fn id(&self) -> &SourceId;

    /// Latest version currently known locally.
    fn current_version(&self) -> Version;

    /// Register the receiver of update notifications.
    ///
    /// Notifications are delivered on `updates` until the source is dropped.
    fn subscribe(&self, updates: mpsc::UnboundedSender<SourceUpdate>) -> Result<()>;

    /// Copy the read-only tree for `version` into `dest`, reconciling
    /// whatever `dest` already holds.
    fn fetch_snapshot(&self, version: Version, dest: &Path) -> Result<()>;

    /// Announce ourselves to peers so newer versions can be replicated.
    fn join_network(&self) -> Result<()>;
}

/// Turns a user supplied name into an opened content source.
pub trait SourceResolver {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ContentSource>>;
}
