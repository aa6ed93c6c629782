// src/watch/debounce.rs

//! Quiet-period debouncing of update notifications.
//!
//! Pure state, no timers: the caller supplies `now` and sleeps until
//! [`Debouncer::deadline`]. Arming while already armed replaces the pending
//! window, so a burst of notifications yields a single emission once the
//! source has been quiet for the whole window.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::Version;

/// A pending quiet period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    /// When the most recent notification arrived.
    pub armed_at: Instant,
    pub deadline: Instant,
    /// Highest version announced by the notifications in this window.
    pub target_version: Version,
    /// Notifications absorbed into this window, including the first.
    pub notifications: u32,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    armed: Option<Armed>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed(&self) -> Option<&Armed> {
        self.armed.as_ref()
    }

    /// Start a new quiet period at `now`, cancelling any pending one.
    pub fn arm(&mut self, now: Instant, version: Version) {
        let (target_version, notifications) = match self.armed {
            Some(prev) => (prev.target_version.max(version), prev.notifications + 1),
            None => (version, 1),
        };
        self.armed = Some(Armed {
            armed_at: now,
            deadline: now + self.window,
            target_version,
            notifications,
        });
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.deadline)
    }

    /// Consume the pending window if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<Armed> {
        match self.armed {
            Some(armed) if now >= armed.deadline => self.armed.take(),
            _ => None,
        }
    }
}
