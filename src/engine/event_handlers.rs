// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::engine::core::SchedulerState;
use crate::engine::RuntimeOptions;
use crate::ledger::is_actionable;
use crate::types::{BuildOutcome, BuildRequest, Version, EMPTY_VERSION};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Hand this request to the build worker.
    StartBuild(BuildRequest),
    /// Stop the process (one-shot mode); `success` selects the exit status.
    RequestExit { success: bool },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn exit(success: bool) -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit { success }],
            keep_running: false,
        }
    }
}

/// Handle a debounced build request from the watcher.
///
/// Stale requests are dropped. In one-shot mode a stale request with nothing
/// else pending means there is nothing left to do.
pub fn handle_build_request(
    state: &mut SchedulerState,
    options: &RuntimeOptions,
    request: BuildRequest,
) -> CoreStep {
    let queued = request.version != EMPTY_VERSION && state.queue.submit(request, state.marker);

    if !queued && options.exit_when_idle && state.is_idle() {
        info!(
            version = request.version,
            marker = ?state.marker,
            "one-shot: requested version is already built; exiting"
        );
        return CoreStep::exit(true);
    }

    CoreStep::running(start_next_if_free(state))
}

/// Handle expiry of the startup catch-up timer.
///
/// If the source is already ahead of the marker and nothing is pending, a
/// build request is synthesized for the current version.
pub fn handle_bootstrap_elapsed(
    state: &mut SchedulerState,
    options: &RuntimeOptions,
    current_version: Version,
) -> CoreStep {
    let ahead = current_version != EMPTY_VERSION && is_actionable(state.marker, current_version);

    if ahead {
        if !state.is_idle() {
            debug!(current_version, "catch-up: a build is already pending");
            return CoreStep::running(Vec::new());
        }
        info!(
            current_version,
            marker = ?state.marker,
            "catch-up: source is ahead of the last build; requesting a build"
        );
        state
            .queue
            .submit(BuildRequest::new(current_version), state.marker);
        return CoreStep::running(start_next_if_free(state));
    }

    info!(
        current_version,
        marker = ?state.marker,
        "catch-up: nothing newer than the last build"
    );
    if options.exit_when_idle && state.is_idle() {
        return CoreStep::exit(true);
    }
    CoreStep::running(Vec::new())
}

/// Handle a finished pipeline run.
pub fn handle_build_finished(
    state: &mut SchedulerState,
    options: &RuntimeOptions,
    outcome: BuildOutcome,
) -> CoreStep {
    if state.in_flight != Some(outcome.version) {
        warn!(
            version = outcome.version,
            in_flight = ?state.in_flight,
            "completion does not match the build in flight"
        );
    }
    state.in_flight = None;

    if outcome.success {
        let marker = state.marker.map_or(outcome.version, |m| m.max(outcome.version));
        state.marker = Some(marker);
        info!(
            version = outcome.version,
            duration = ?outcome.duration,
            "build succeeded"
        );
    } else {
        warn!(
            version = outcome.version,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            marker = ?state.marker,
            "build failed; marker unchanged"
        );
    }

    if options.exit_when_idle {
        info!(success = outcome.success, "one-shot: build finished; exiting");
        return CoreStep::exit(outcome.success);
    }

    CoreStep::running(start_next_if_free(state))
}

/// If no build is running, start the oldest actionable queued request.
fn start_next_if_free(state: &mut SchedulerState) -> Vec<CoreCommand> {
    if state.in_flight.is_some() {
        return Vec::new();
    }

    match state.queue.next_actionable(state.marker) {
        Some(request) => {
            state.in_flight = Some(request.version);
            vec![CoreCommand::StartBuild(request)]
        }
        None => Vec::new(),
    }
}
