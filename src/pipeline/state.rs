// src/pipeline/state.rs

use std::fmt;

/// Stage of a pipeline run.
///
/// ```text
/// Idle -> Downloading -> Building -> Swapping -> Publishing -> Idle
///              \             \           \            \
///               +-------------+-----------+------------+--> Failed -> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Downloading,
    Building,
    Swapping,
    Publishing,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Downloading)
                | (Downloading, Building)
                | (Building, Swapping)
                | (Swapping, Publishing)
                | (Publishing, Idle)
                | (Downloading | Building | Swapping | Publishing, Failed)
                | (Failed, Idle)
        )
    }

    /// Name of the stage as used in logs and cancellation errors.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Downloading => "downloading",
            PipelineState::Building => "building",
            PipelineState::Swapping => "swapping",
            PipelineState::Publishing => "publishing",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineState::*;

    #[test]
    fn success_path_is_allowed() {
        let path = [Idle, Downloading, Building, Swapping, Publishing, Idle];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn stages_can_fail_but_idle_cannot() {
        for s in [Downloading, Building, Swapping, Publishing] {
            assert!(s.can_transition_to(Failed));
        }
        assert!(!Idle.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Idle));
    }

    #[test]
    fn stages_cannot_be_skipped() {
        assert!(!Idle.can_transition_to(Building));
        assert!(!Downloading.can_transition_to(Swapping));
        assert!(!Building.can_transition_to(Publishing));
    }
}
