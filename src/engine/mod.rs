// src/engine/mod.rs

//! Orchestration engine for revbuild.
//!
//! This module ties together:
//! - the job queue (serialized FIFO of build requests)
//! - the main runtime event loop that reacts to:
//!   - debounced build requests from the update watcher
//!   - the startup catch-up check
//!   - build completion
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::{BuildOutcome, BuildRequest, Version};

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit after the first build finishes, or as soon as the
    /// catch-up check finds nothing newer than the marker (one-shot mode).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, the build worker, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The update watcher emitted a debounced build request.
    BuildRequested(BuildRequest),
    /// No update arrived within the bootstrap timeout; `current_version` is
    /// what the source reported at expiry.
    BootstrapElapsed { current_version: Version },
    /// The build worker finished a pipeline run.
    BuildFinished(BuildOutcome),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::JobQueue;
pub use runtime::Runtime;
