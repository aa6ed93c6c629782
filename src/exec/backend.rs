// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The runtime talks to a `BuildBackend` instead of owning the pipeline, so
//! tests can swap in a fake that records requests and reports outcomes
//! without touching the filesystem.

use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::pipeline::BuildPipeline;
use crate::types::BuildRequest;

use super::worker::spawn_build_worker;

/// Trait abstracting how build requests are carried out.
///
/// Implementations must eventually answer every request with exactly one
/// `RuntimeEvent::BuildFinished`.
pub trait BuildBackend: Send {
    /// Hand one request to the builder.
    fn start_build(
        &mut self,
        request: BuildRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop in-flight work at its next checkpoint and wait until the builder
    /// has let go of it.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// Production backend: a background worker that owns the [`BuildPipeline`].
pub struct PipelineBackend {
    /// `None` once shut down; dropping it lets the worker drain and stop.
    tx: Option<mpsc::Sender<BuildRequest>>,
    worker: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl PipelineBackend {
    /// Spawn the build worker immediately.
    ///
    /// `shutdown` must be the sender paired with the receiver the pipeline
    /// was built with.
    pub fn new(
        pipeline: BuildPipeline,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        let (tx, worker) = spawn_build_worker(pipeline, runtime_tx);
        Self {
            tx: Some(tx),
            worker: Some(worker),
            shutdown,
        }
    }
}

impl BuildBackend for PipelineBackend {
    fn start_build(
        &mut self,
        request: BuildRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            let tx = tx.ok_or_else(|| anyhow!("build worker has been shut down"))?;
            tx.send(request).await.map_err(Error::from)?;
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.shutdown.send(true).is_err() {
                debug!("pipeline already gone at shutdown");
            }
            self.tx = None;

            if let Some(worker) = self.worker.take() {
                match worker.await {
                    Ok(()) => debug!("build worker joined"),
                    Err(err) => warn!(error = %err, "build worker ended abnormally"),
                }
            }
        })
    }
}
