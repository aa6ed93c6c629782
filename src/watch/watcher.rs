// src/watch/watcher.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::WatchSection;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::source::{ContentSource, SourceUpdate};
use crate::types::{BuildRequest, Version};
use crate::watch::debounce::Debouncer;

#[derive(Debug, Clone, Copy)]
pub struct WatcherOptions {
    pub debounce: Duration,
    pub bootstrap_timeout: Duration,
}

impl From<&WatchSection> for WatcherOptions {
    fn from(section: &WatchSection) -> Self {
        Self {
            debounce: section.debounce(),
            bootstrap_timeout: section.bootstrap_timeout(),
        }
    }
}

/// Handle for the update watcher task.
///
/// Dropping it stops the watcher.
pub struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Subscribe to `source` and spawn the task that turns its notifications
/// into `RuntimeEvent::BuildRequested`.
///
/// The task also reports `RuntimeEvent::BootstrapElapsed` once if no
/// notification arrives within the bootstrap timeout.
pub fn spawn_watcher(
    source: Arc<dyn ContentSource>,
    options: WatcherOptions,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let (update_tx, update_rx) = mpsc::unbounded_channel::<SourceUpdate>();
    source.subscribe(update_tx)?;

    info!(
        source = %source.id(),
        debounce = ?options.debounce,
        bootstrap_timeout = ?options.bootstrap_timeout,
        "update watcher started"
    );

    let task = tokio::spawn(watch_loop(source, options, update_rx, runtime_tx));
    Ok(WatcherHandle { task })
}

async fn watch_loop(
    source: Arc<dyn ContentSource>,
    options: WatcherOptions,
    mut updates: mpsc::UnboundedReceiver<SourceUpdate>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let mut debouncer = Debouncer::new(options.debounce);
    let bootstrap = sleep(options.bootstrap_timeout);
    tokio::pin!(bootstrap);
    let mut bootstrap_pending = true;
    let mut updates_open = true;

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            update = updates.recv(), if updates_open => match update {
                Some(update) => {
                    if bootstrap_pending {
                        debug!("first notification received; bootstrap check cancelled");
                        bootstrap_pending = false;
                    }
                    debouncer.arm(Instant::now(), update.version);
                    debug!(version = update.version, "notification; debounce window re-armed");
                }
                None => {
                    debug!("source notification channel closed");
                    updates_open = false;
                }
            },

            () = &mut bootstrap, if bootstrap_pending => {
                bootstrap_pending = false;
                let current_version = current_version(&source).await;
                info!(current_version, "no notification before bootstrap timeout");
                if runtime_tx
                    .send(RuntimeEvent::BootstrapElapsed { current_version })
                    .await
                    .is_err()
                {
                    break;
                }
            }

            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(armed) = debouncer.fire(Instant::now()) {
                    let version = current_version(&source).await.max(armed.target_version);
                    info!(
                        version,
                        notifications = armed.notifications,
                        "source quiet; requesting build"
                    );
                    if runtime_tx
                        .send(RuntimeEvent::BuildRequested(BuildRequest::new(version)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }

            else => break,
        }

        if !updates_open && !bootstrap_pending && !debouncer.is_armed() {
            break;
        }
    }

    debug!("update watcher loop finished");
}

/// Ask the source for its version off the async workers; listing a source can
/// hit the disk or the network.
async fn current_version(source: &Arc<dyn ContentSource>) -> Version {
    let source = Arc::clone(source);
    match tokio::task::spawn_blocking(move || source.current_version()).await {
        Ok(version) => version,
        Err(err) => {
            warn!(error = %err, "version lookup task failed; treating source as empty");
            0
        }
    }
}
