// src/engine/runtime.rs

use std::fmt;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{Result, RevbuildError};
use crate::exec::BuildBackend;
use crate::types::BuildRequest;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the core scheduler in response to `RuntimeEvent`s and delegates
/// the actual builds to a `BuildBackend`.
///
/// All semantics live in `CoreRuntime`; this struct only reads events from
/// the channel and carries out the commands the core returns.
pub struct Runtime<B: BuildBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: BuildBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop.
    ///
    /// Returns an error only when one-shot mode ends with a failed build or
    /// the backend cannot accept work.
    pub async fn run(mut self) -> Result<()> {
        info!(marker = ?self.core.marker(), "revbuild runtime started");
        let mut exit_success = true;

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                match command {
                    CoreCommand::StartBuild(request) => self.start_build(request).await?,
                    CoreCommand::RequestExit { success } => {
                        info!(success, "core requested exit");
                        exit_success = success;
                    }
                }
            }

            if !step.keep_running {
                info!("stopping runtime");
                break;
            }
        }

        // Late BuildFinished events have nowhere to go; let senders fail fast
        // while the backend winds down.
        self.event_rx.close();
        self.backend.shutdown().await;
        info!(marker = ?self.core.marker(), "runtime exiting");

        if exit_success {
            Ok(())
        } else {
            Err(RevbuildError::Other(anyhow!("one-shot build failed")))
        }
    }

    async fn start_build(&mut self, request: BuildRequest) -> Result<()> {
        debug!(version = request.version, "dispatching build");
        self.backend.start_build(request).await
    }
}
