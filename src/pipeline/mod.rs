// src/pipeline/mod.rs

//! Build pipeline: snapshot -> transform -> swap -> persist -> publish.
//!
//! One [`BuildPipeline`] exists per process and is owned by the build worker,
//! so runs never overlap. Every stage error is turned into a failed
//! [`BuildOutcome`] at the stage boundary; the version marker is only written
//! once the new output is live.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, RevbuildError};
use crate::fs::promote_output;
use crate::ledger::VersionLedger;
use crate::publish::PublisherGate;
use crate::source::ContentSource;
use crate::types::{BuildOutcome, BuildRequest, SourceId, Version};

pub mod state;
pub mod transformer;

pub use state::PipelineState;
pub use transformer::{ShellTransformer, TransformInput, Transformer, TransformerExit};

/// Per-source working area under the data directory.
///
/// ```text
/// <data_dir>/<source id>/
/// ├── source/        snapshot of the version being built
/// ├── build/         transformer output, before promotion
/// ├── outputs/<v>/   promoted output trees
/// ├── staging  ->    link to the live tree under outputs/
/// ├── publish/       default directory publish target
/// └── version        marker
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectories {
    pub root: PathBuf,
    pub snapshot_dir: PathBuf,
    pub output_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub staging_link: PathBuf,
    pub publish_dir: PathBuf,
}

impl WorkingDirectories {
    pub fn for_source(data_dir: &Path, id: &SourceId) -> Self {
        let root = data_dir.join(id.as_str());
        Self {
            snapshot_dir: root.join("source"),
            output_dir: root.join("build"),
            outputs_dir: root.join("outputs"),
            staging_link: root.join("staging"),
            publish_dir: root.join("publish"),
            root,
        }
    }

    /// Create the directories that must exist before the first build.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.snapshot_dir, &self.outputs_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Treat a nonzero transformer exit as a failed build.
    pub fail_on_nonzero_exit: bool,
}

pub struct BuildPipeline {
    source: Arc<dyn ContentSource>,
    ledger: Arc<Mutex<Box<dyn VersionLedger>>>,
    transformer: Box<dyn Transformer>,
    publisher: Option<PublisherGate>,
    dirs: WorkingDirectories,
    options: PipelineOptions,
    shutdown: watch::Receiver<bool>,
    state: PipelineState,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("source", self.source.id())
            .field("state", &self.state)
            .field("dirs", &self.dirs)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl BuildPipeline {
    pub fn new(
        source: Arc<dyn ContentSource>,
        ledger: Box<dyn VersionLedger>,
        transformer: Box<dyn Transformer>,
        publisher: Option<PublisherGate>,
        dirs: WorkingDirectories,
        options: PipelineOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            ledger: Arc::new(Mutex::new(ledger)),
            transformer,
            publisher,
            dirs,
            options,
            shutdown,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn dirs(&self) -> &WorkingDirectories {
        &self.dirs
    }

    /// The persisted marker, read straight from the ledger.
    pub fn marker(&self) -> Result<Option<Version>> {
        lock_ledger(&self.ledger)?.load()
    }

    /// Run one build to completion and report how it went.
    ///
    /// Always leaves the pipeline `Idle`.
    pub async fn run(&mut self, request: BuildRequest) -> BuildOutcome {
        let version = request.version;
        let started = Instant::now();
        info!(
            version,
            queued_for = ?request.requested_at.elapsed(),
            "build started"
        );

        match self.run_stages(version).await {
            Ok(()) => {
                self.transition(PipelineState::Idle);
                let duration = started.elapsed();
                info!(version, ?duration, "build succeeded");
                BuildOutcome::succeeded(version, duration)
            }
            Err(err) => {
                error!(version, stage = %self.state, error = %err, "build failed");
                // Cancellation before the first stage never left Idle.
                if self.state != PipelineState::Idle {
                    self.transition(PipelineState::Failed);
                    self.transition(PipelineState::Idle);
                }
                BuildOutcome::failed(version, err)
            }
        }
    }

    async fn run_stages(&mut self, version: Version) -> Result<()> {
        self.enter(PipelineState::Downloading)?;
        self.download(version).await?;

        self.enter(PipelineState::Building)?;
        self.build(version).await?;

        self.enter(PipelineState::Swapping)?;
        self.swap(version).await?;

        self.enter(PipelineState::Publishing)?;
        self.persist(version).await?;
        self.publish(version).await;

        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "unexpected pipeline transition");
        }
        debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }

    /// Move to `next` unless shutdown has been requested.
    fn enter(&mut self, next: PipelineState) -> Result<()> {
        if *self.shutdown.borrow() {
            return Err(RevbuildError::Cancelled(next.as_str()));
        }
        self.transition(next);
        Ok(())
    }

    async fn download(&self, version: Version) -> Result<()> {
        let source = Arc::clone(&self.source);
        let dest = self.dirs.snapshot_dir.clone();

        tokio::task::spawn_blocking(move || source.fetch_snapshot(version, &dest))
            .await
            .map_err(|e| RevbuildError::DownloadError {
                version,
                reason: format!("snapshot task failed: {e}"),
            })?
            .map_err(|e| match e {
                RevbuildError::DownloadError { .. } => e,
                other => RevbuildError::DownloadError {
                    version,
                    reason: other.to_string(),
                },
            })
    }

    async fn build(&self, version: Version) -> Result<()> {
        let output_dir = &self.dirs.output_dir;
        match tokio::fs::remove_dir_all(output_dir).await {
            Ok(()) => debug!(?output_dir, "cleared previous build output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let transform = self.transformer.transform(TransformInput {
            snapshot_dir: self.dirs.snapshot_dir.clone(),
            output_dir: output_dir.clone(),
            version,
        });
        let mut shutdown = self.shutdown.clone();

        // Dropping the transform future kills the child process.
        let exit = tokio::select! {
            exit = transform => exit?,
            () = shutdown_requested(&mut shutdown) => {
                warn!(version, "shutdown requested; stopping transformer");
                return Err(RevbuildError::Cancelled(PipelineState::Building.as_str()));
            }
        };

        if !exit.success {
            if self.options.fail_on_nonzero_exit {
                return Err(RevbuildError::TransformerExitError(exit.code.unwrap_or(-1)));
            }
            warn!(
                version,
                exit_code = ?exit.code,
                "transformer exited unsuccessfully; continuing with its output"
            );
        }
        Ok(())
    }

    async fn swap(&self, version: Version) -> Result<()> {
        let output_dir = self.dirs.output_dir.clone();
        let outputs_dir = self.dirs.outputs_dir.clone();
        let staging = self.dirs.staging_link.clone();

        let live = tokio::task::spawn_blocking(move || {
            promote_output(&output_dir, &outputs_dir, &staging, &version.to_string())
        })
        .await
        .map_err(|e| RevbuildError::SwapError(format!("swap task failed: {e}")))?
        .map_err(|e| RevbuildError::SwapError(format!("{e:#}")))?;

        info!(version, live = ?live, "new output is live");
        Ok(())
    }

    async fn persist(&self, version: Version) -> Result<()> {
        let ledger = Arc::clone(&self.ledger);

        tokio::task::spawn_blocking(move || {
            let mut guard = lock_ledger(&ledger)?;
            guard.store(version)
        })
        .await
        .map_err(|e| RevbuildError::LedgerError(format!("marker task failed: {e}")))?
    }

    /// Publish failures are logged and never fail the build.
    async fn publish(&mut self, version: Version) {
        let Some(mut gate) = self.publisher.take() else {
            debug!(version, "publishing disabled");
            return;
        };

        match tokio::task::spawn_blocking(move || {
            let result = gate.publish();
            (gate, result)
        })
        .await
        {
            Ok((gate, result)) => {
                self.publisher = Some(gate);
                match result {
                    Ok(report) => info!(version, address = %report.address, "output published"),
                    Err(err) => warn!(version, error = %err, "publish failed"),
                }
            }
            Err(err) => error!(version, error = %err, "publish task panicked; publishing disabled"),
        }
    }
}

fn lock_ledger(
    ledger: &Mutex<Box<dyn VersionLedger>>,
) -> Result<std::sync::MutexGuard<'_, Box<dyn VersionLedger>>> {
    ledger
        .lock()
        .map_err(|_| RevbuildError::LedgerError("ledger mutex poisoned".to_string()))
}

/// Resolves once the shutdown flag is set; never resolves if its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
