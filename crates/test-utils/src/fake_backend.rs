use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use revbuild::engine::RuntimeEvent;
use revbuild::errors::Result;
use revbuild::exec::BuildBackend;
use revbuild::types::{BuildOutcome, BuildRequest, Version};

#[derive(Debug, Default)]
struct BackendLog {
    started: Vec<Version>,
    running: usize,
    max_running: usize,
    shutdown: bool,
}

/// Shared view of what a [`FakeBackend`] did.
#[derive(Debug, Clone, Default)]
pub struct BackendRecorder(Arc<Mutex<BackendLog>>);

impl BackendRecorder {
    /// Versions in the order their builds were started.
    pub fn started(&self) -> Vec<Version> {
        self.0.lock().unwrap().started.clone()
    }

    /// Highest number of builds that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.0.lock().unwrap().max_running
    }

    pub fn shutdown_called(&self) -> bool {
        self.0.lock().unwrap().shutdown
    }
}

/// A fake build backend that:
/// - records which versions were started
/// - "builds" for a configurable delay on a spawned task, so overlapping
///   dispatches would show up as concurrency > 1
/// - reports BuildFinished, failing the versions it was told to fail.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    recorder: BackendRecorder,
    failing: HashSet<Version>,
    delay: Duration,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            recorder: BackendRecorder::default(),
            failing: HashSet::new(),
            delay: Duration::from_millis(10),
        }
    }

    pub fn failing(mut self, version: Version) -> Self {
        self.failing.insert(version);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn recorder(&self) -> BackendRecorder {
        self.recorder.clone()
    }
}

impl BuildBackend for FakeBackend {
    fn start_build(
        &mut self,
        request: BuildRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let log = Arc::clone(&self.recorder.0);
        let fail = self.failing.contains(&request.version);
        let delay = self.delay;

        Box::pin(async move {
            {
                let mut guard = log.lock().unwrap();
                guard.started.push(request.version);
                guard.running += 1;
                guard.max_running = guard.max_running.max(guard.running);
            }

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                log.lock().unwrap().running -= 1;

                let outcome = if fail {
                    BuildOutcome::failed(request.version, "fake download failure")
                } else {
                    BuildOutcome::succeeded(request.version, delay)
                };
                let _ = tx.send(RuntimeEvent::BuildFinished(outcome)).await;
            });
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.recorder.0.lock().unwrap().shutdown = true;
        Box::pin(async {})
    }
}
