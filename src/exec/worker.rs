// src/exec/worker.rs

//! Background task that owns the build pipeline.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::pipeline::BuildPipeline;
use crate::types::BuildRequest;

/// Spawn the build worker loop.
///
/// Requests are processed one at a time in arrival order; the pipeline is
/// never shared, so a second build cannot start before the first one has
/// reported `BuildFinished`. The task ends once every sender is dropped and
/// the queue is drained, or when the runtime stops listening.
pub fn spawn_build_worker(
    mut pipeline: BuildPipeline,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> (mpsc::Sender<BuildRequest>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<BuildRequest>(8);

    let handle = tokio::spawn(async move {
        info!("build worker started");

        while let Some(request) = rx.recv().await {
            let outcome = pipeline.run(request).await;
            if runtime_tx
                .send(RuntimeEvent::BuildFinished(outcome))
                .await
                .is_err()
            {
                debug!("runtime channel closed; build worker stopping");
                break;
            }
        }

        info!("build worker finished");
    });

    (tx, handle)
}
