// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::ledger::is_actionable;
use crate::types::{BuildRequest, Version};

/// FIFO of build requests waiting for the single build slot.
///
/// Requests at or below the marker are refused on submit, and checked again
/// when dequeued: a request can go stale while an earlier build runs.
#[derive(Debug, Default)]
pub struct JobQueue {
    pending: VecDeque<BuildRequest>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Enqueue `request` unless it is not newer than `marker`.
    ///
    /// Returns whether the request was queued.
    pub fn submit(&mut self, request: BuildRequest, marker: Option<Version>) -> bool {
        if !is_actionable(marker, request.version) {
            info!(
                version = request.version,
                marker = ?marker,
                "dropping stale build request"
            );
            return false;
        }

        self.pending.push_back(request);
        debug!(
            version = request.version,
            queued = self.pending.len(),
            "build request queued"
        );
        true
    }

    /// Pop the oldest request still newer than `marker`, discarding stale ones.
    pub fn next_actionable(&mut self, marker: Option<Version>) -> Option<BuildRequest> {
        while let Some(request) = self.pending.pop_front() {
            if is_actionable(marker, request.version) {
                return Some(request);
            }
            debug!(
                version = request.version,
                marker = ?marker,
                "discarding queued request made stale by an earlier build"
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_requests_are_not_queued() {
        let mut q = JobQueue::new();
        assert!(!q.submit(BuildRequest::new(5), Some(5)));
        assert!(!q.submit(BuildRequest::new(4), Some(5)));
        assert!(q.is_empty());
    }

    #[test]
    fn requests_come_out_in_submission_order() {
        let mut q = JobQueue::new();
        q.submit(BuildRequest::new(7), None);
        q.submit(BuildRequest::new(3), None);
        assert_eq!(q.next_actionable(None).map(|r| r.version), Some(7));
        assert_eq!(q.next_actionable(None).map(|r| r.version), Some(3));
        assert_eq!(q.next_actionable(None), None);
    }

    #[test]
    fn dequeue_skips_requests_overtaken_by_the_marker() {
        let mut q = JobQueue::new();
        q.submit(BuildRequest::new(6), Some(5));
        q.submit(BuildRequest::new(8), Some(5));

        assert_eq!(q.next_actionable(Some(7)).map(|r| r.version), Some(8));
        assert!(q.is_empty());
    }
}
