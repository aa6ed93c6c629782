// tests/scheduler_properties.rs

use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;

use revbuild::engine::{CoreCommand, CoreRuntime, RuntimeEvent, RuntimeOptions};
use revbuild::ledger::is_actionable;
use revbuild::types::Version;
use revbuild::watch::Debouncer;
use revbuild_test_utils::builders::{finished, requested};

#[derive(Debug, Clone)]
enum Op {
    Request(Version),
    Bootstrap(Version),
    /// Complete the build in flight, if any.
    Finish(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..12).prop_map(Op::Request),
        1 => (0u64..12).prop_map(Op::Bootstrap),
        3 => any::<bool>().prop_map(Op::Finish),
    ]
}

proptest! {
    #[test]
    fn core_runs_one_build_at_a_time_and_marker_never_decreases(
        initial in proptest::option::of(0u64..6),
        ops in proptest::collection::vec(op(), 1..80),
    ) {
        let mut core = CoreRuntime::new(initial, RuntimeOptions { exit_when_idle: false });
        let mut running: Option<Version> = None;
        let mut marker = initial;

        for op in ops {
            let event = match op {
                Op::Request(v) => requested(v),
                Op::Bootstrap(v) => RuntimeEvent::BootstrapElapsed { current_version: v },
                Op::Finish(ok) => match running.take() {
                    Some(v) => finished(v, ok),
                    None => continue,
                },
            };

            let step = core.step(event);
            prop_assert!(step.keep_running);

            let starts: Vec<Version> = step
                .commands
                .iter()
                .filter_map(|c| match c {
                    CoreCommand::StartBuild(r) => Some(r.version),
                    _ => None,
                })
                .collect();
            prop_assert!(starts.len() <= 1);

            if let Some(&v) = starts.first() {
                prop_assert!(running.is_none(), "started {} while {:?} was running", v, running);
                prop_assert!(is_actionable(core.marker(), v));
                running = Some(v);
            }
            prop_assert_eq!(core.in_flight(), running);

            if let Some(prev) = marker {
                prop_assert!(core.marker().is_some_and(|now| now >= prev));
            }
            marker = core.marker();
        }
    }

    #[test]
    fn notifications_within_one_window_fire_once_with_the_highest_version(
        versions in proptest::collection::vec(1u64..1000, 1..20),
        gaps_ms in proptest::collection::vec(0u64..1000, 20),
    ) {
        let window = Duration::from_millis(1000);
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(window);
        let mut now = t0;

        for (i, v) in versions.iter().enumerate() {
            if i > 0 {
                now += Duration::from_millis(gaps_ms[i]);
            }
            // Every gap is shorter than the window, so nothing fires early.
            prop_assert!(debouncer.fire(now).is_none());
            debouncer.arm(now, *v);
        }

        prop_assert!(debouncer.fire(now + window - Duration::from_millis(1)).is_none());
        let fired = debouncer.fire(now + window);
        prop_assert_eq!(fired.map(|a| a.target_version), versions.iter().copied().max());
        prop_assert!(debouncer.fire(now + window * 10).is_none());
    }
}
