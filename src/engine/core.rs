// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing build requests to the build worker
//! - handling Ctrl+C / shutdown
//!
//! The core has no Tokio types, channels, filesystem access or processes.

use crate::engine::event_handlers::{
    handle_bootstrap_elapsed, handle_build_finished, handle_build_request, CoreStep,
};
use crate::engine::queue::JobQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::Version;

/// Scheduling state owned by the core.
#[derive(Debug, Default)]
pub struct SchedulerState {
    /// Last successfully built version, seeded from the ledger at startup.
    pub marker: Option<Version>,
    /// Version currently being built; at most one.
    pub in_flight: Option<Version>,
    pub queue: JobQueue,
}

impl SchedulerState {
    /// Nothing running and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    state: SchedulerState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(marker: Option<Version>, options: RuntimeOptions) -> Self {
        Self {
            state: SchedulerState {
                marker,
                ..SchedulerState::default()
            },
            options,
        }
    }

    pub fn marker(&self) -> Option<Version> {
        self.state.marker
    }

    pub fn in_flight(&self) -> Option<Version> {
        self.state.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BuildRequested(request) => {
                handle_build_request(&mut self.state, &self.options, request)
            }
            RuntimeEvent::BootstrapElapsed { current_version } => {
                handle_bootstrap_elapsed(&mut self.state, &self.options, current_version)
            }
            RuntimeEvent::BuildFinished(outcome) => {
                handle_build_finished(&mut self.state, &self.options, outcome)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
