// src/publish/mod.rs

//! Publisher gate.
//!
//! The gate owns at most one publish target, provisioned lazily on the first
//! publish and reused for the rest of the process. A failed provisioning
//! attempt leaves the slot empty so the next publish tries again.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::{Result, RevbuildError};

pub mod dir;

pub use dir::{DirectoryPublisher, DirectoryTarget};

/// What a single sync of the staging tree changed on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Resolvable address of the published tree.
    pub address: String,
    pub copied: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Creates publish targets bound to a staging directory.
pub trait Publisher: Send + Sync {
    fn provision(&self, staging: &Path) -> Result<Box<dyn PublishTarget>>;
}

/// A provisioned distribution endpoint for one staging directory.
pub trait PublishTarget: Send + Sync {
    /// Bring the target in line with the staging directory.
    fn sync(&mut self) -> Result<PublishReport>;

    /// Address under which the last synced tree can be fetched.
    fn address(&self) -> String;
}

pub struct PublisherGate {
    publisher: Box<dyn Publisher>,
    staging: PathBuf,
    target: Option<Box<dyn PublishTarget>>,
}

impl std::fmt::Debug for PublisherGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherGate")
            .field("staging", &self.staging)
            .field("provisioned", &self.target.is_some())
            .finish_non_exhaustive()
    }
}

impl PublisherGate {
    pub fn new(publisher: Box<dyn Publisher>, staging: impl Into<PathBuf>) -> Self {
        Self {
            publisher,
            staging: staging.into(),
            target: None,
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.target.is_some()
    }

    /// Republish the staging directory. Blocking.
    pub fn publish(&mut self) -> Result<PublishReport> {
        let mut target = match self.target.take() {
            Some(target) => target,
            None => {
                let target = self.publisher.provision(&self.staging).map_err(|e| {
                    warn!(staging = ?self.staging, error = %e, "publish target provisioning failed");
                    RevbuildError::PublishError(format!("provisioning target: {e}"))
                })?;
                info!(staging = ?self.staging, "publish target provisioned");
                target
            }
        };

        let synced = target.sync();
        self.target = Some(target);
        let report = synced.map_err(|e| match e {
            RevbuildError::PublishError(_) => e,
            other => RevbuildError::PublishError(other.to_string()),
        })?;

        info!(
            address = %report.address,
            copied = report.copied,
            deleted = report.deleted,
            unchanged = report.unchanged,
            "published"
        );
        Ok(report)
    }
}
