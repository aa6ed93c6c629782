// src/watch/mod.rs

//! Update watching.
//!
//! Turns the raw notification stream of a content source into debounced
//! build requests, and performs the one-off startup catch-up check. It does
//! not know about the version marker; the runtime core decides what a
//! request or a bootstrap expiry means.

pub mod debounce;
pub mod watcher;

pub use debounce::{Armed, Debouncer};
pub use watcher::{spawn_watcher, WatcherHandle, WatcherOptions};
