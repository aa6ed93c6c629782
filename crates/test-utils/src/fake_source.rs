use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use revbuild::errors::{Result, RevbuildError};
use revbuild::source::{ContentSource, SourceUpdate};
use revbuild::types::{SourceId, Version};

#[derive(Debug, Default)]
struct SourceState {
    version: Version,
    trees: BTreeMap<Version, Vec<(String, String)>>,
    failing: HashSet<Version>,
    subscribers: Vec<mpsc::UnboundedSender<SourceUpdate>>,
    fetched: Vec<Version>,
}

/// In-memory content source driven by the test.
///
/// Each version is a flat list of `(relative path, contents)` files. Fetching
/// replaces the destination's contents with that list.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    id: SourceId,
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: SourceId::new(id),
            state: Arc::default(),
        }
    }

    /// Make `version` available with `files` and current, without notifying.
    pub fn set_version(&self, version: Version, files: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.version = state.version.max(version);
        state.trees.insert(
            version,
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    /// Send a notification announcing `version` to every subscriber.
    pub fn notify(&self, version: Version) {
        let mut state = self.state.lock().unwrap();
        state.version = state.version.max(version);
        state
            .subscribers
            .retain(|tx| tx.send(SourceUpdate { version }).is_ok());
    }

    /// `set_version` followed by `notify`.
    pub fn publish(&self, version: Version, files: &[(&str, &str)]) {
        self.set_version(version, files);
        self.notify(version);
    }

    /// Make every fetch of `version` fail.
    pub fn fail_fetch(&self, version: Version) {
        self.state.lock().unwrap().failing.insert(version);
    }

    /// Versions fetched so far, in order.
    pub fn fetched(&self) -> Vec<Version> {
        self.state.lock().unwrap().fetched.clone()
    }

    /// Drop every subscriber, closing their channels.
    pub fn close(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }
}

impl ContentSource for ScriptedSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn current_version(&self) -> Version {
        self.state.lock().unwrap().version
    }

    fn subscribe(&self, updates: mpsc::UnboundedSender<SourceUpdate>) -> Result<()> {
        self.state.lock().unwrap().subscribers.push(updates);
        Ok(())
    }

    fn fetch_snapshot(&self, version: Version, dest: &Path) -> Result<()> {
        let files = {
            let mut state = self.state.lock().unwrap();
            state.fetched.push(version);
            if state.failing.contains(&version) {
                return Err(RevbuildError::DownloadError {
                    version,
                    reason: "scripted failure".to_string(),
                });
            }
            state.trees.get(&version).cloned().ok_or_else(|| {
                RevbuildError::DownloadError {
                    version,
                    reason: "unknown version".to_string(),
                }
            })?
        };

        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::create_dir_all(dest)?;
        for (rel, contents) in files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        Ok(())
    }

    fn join_network(&self) -> Result<()> {
        Ok(())
    }
}
