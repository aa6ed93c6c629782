// tests/pipeline_e2e.rs

// The live output pointer is a symlink.
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::watch;
use walkdir::WalkDir;

use revbuild::fs::live_target;
use revbuild::ledger::{FileLedger, VersionLedger};
use revbuild::pipeline::{
    BuildPipeline, PipelineOptions, PipelineState, Transformer, WorkingDirectories,
};
use revbuild::publish::{DirectoryPublisher, PublisherGate};
use revbuild::source::{ContentSource, DirectorySource};
use revbuild::types::{BuildRequest, SourceId, Version};
use revbuild_test_utils::fake_source::ScriptedSource;
use revbuild_test_utils::fake_transformer::{Behaviour, CopyTransformer};
use revbuild_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    _tmp: TempDir,
    dirs: WorkingDirectories,
    publish_dir: PathBuf,
    pipeline: BuildPipeline,
    shutdown: watch::Sender<bool>,
}

struct Setup {
    marker: Option<Version>,
    options: PipelineOptions,
    publish: bool,
    /// Occupy the publish location with a regular file.
    break_publish: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            marker: None,
            options: PipelineOptions::default(),
            publish: true,
            break_publish: false,
        }
    }
}

fn harness(
    source: Arc<dyn ContentSource>,
    transformer: Box<dyn Transformer>,
    setup: Setup,
) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let dirs = WorkingDirectories::for_source(tmp.path(), source.id());
    dirs.ensure().unwrap();

    let mut ledger = FileLedger::new(source.id().clone(), &dirs.root);
    if let Some(marker) = setup.marker {
        ledger.store(marker).unwrap();
    }

    let publish_dir = tmp.path().join("published");
    if setup.break_publish {
        fs::write(&publish_dir, "not a directory").unwrap();
    }
    let publisher = setup.publish.then(|| {
        PublisherGate::new(
            Box::new(DirectoryPublisher::new(&publish_dir)),
            dirs.staging_link.clone(),
        )
    });

    let (shutdown, shutdown_rx) = watch::channel(false);
    let pipeline = BuildPipeline::new(
        source,
        Box::new(ledger),
        transformer,
        publisher,
        dirs.clone(),
        setup.options,
        shutdown_rx,
    );

    Harness {
        _tmp: tmp,
        dirs,
        publish_dir,
        pipeline,
        shutdown,
    }
}

fn scripted(transformer: &CopyTransformer, setup: Setup) -> (ScriptedSource, Harness) {
    let source = ScriptedSource::new("scripted");
    let h = harness(
        Arc::new(source.clone()),
        Box::new(transformer.clone()),
        setup,
    );
    (source, h)
}

fn marker(h: &Harness) -> Option<Version> {
    h.pipeline.marker().unwrap()
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn successful_build_goes_live_persists_marker_and_publishes() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let (source, mut h) = scripted(&transformer, Setup::default());
    source.set_version(3, &[("index.md", "# three")]);

    let outcome = h.pipeline.run(BuildRequest::new(3)).await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert!(outcome.duration.is_some());
    assert_eq!(marker(&h), Some(3));
    assert_eq!(read(h.dirs.staging_link.join("index.md")), "# three");
    assert_eq!(read(h.publish_dir.join("index.md")), "# three");
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    Ok(())
}

#[tokio::test]
async fn download_failure_keeps_marker_and_live_tree() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let (source, mut h) = scripted(&transformer, Setup::default());
    source.set_version(7, &[("page.md", "seven")]);
    assert!(h.pipeline.run(BuildRequest::new(7)).await.success);

    source.set_version(8, &[("page.md", "eight")]);
    source.fail_fetch(8);
    let outcome = h.pipeline.run(BuildRequest::new(8)).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap_or_default().contains("version 8"));
    assert_eq!(marker(&h), Some(7));
    assert_eq!(read(h.dirs.staging_link.join("page.md")), "seven");
    assert_eq!(transformer.runs(), vec![7]);
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_is_tolerated_by_default() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::CopyThenExit(2));
    let (source, mut h) = scripted(&transformer, Setup::default());
    source.set_version(1, &[("a.txt", "a")]);

    let outcome = h.pipeline.run(BuildRequest::new(1)).await;

    assert!(outcome.success);
    assert_eq!(marker(&h), Some(1));
    assert_eq!(read(h.dirs.staging_link.join("a.txt")), "a");
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_fails_the_build_when_configured() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::CopyThenExit(2));
    let setup = Setup {
        options: PipelineOptions {
            fail_on_nonzero_exit: true,
        },
        ..Setup::default()
    };
    let (source, mut h) = scripted(&transformer, setup);
    source.set_version(1, &[("a.txt", "a")]);

    let outcome = h.pipeline.run(BuildRequest::new(1)).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap_or_default().contains("code 2"));
    assert_eq!(marker(&h), None);
    assert!(live_target(&h.dirs.staging_link).is_none());
    Ok(())
}

#[tokio::test]
async fn transformer_that_cannot_start_fails_the_build() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::CannotStart);
    let (source, mut h) = scripted(
        &transformer,
        Setup {
            marker: Some(4),
            ..Setup::default()
        },
    );
    source.set_version(5, &[("a.txt", "a")]);

    let outcome = h.pipeline.run(BuildRequest::new(5)).await;
    assert!(!outcome.success);
    assert_eq!(marker(&h), Some(4));

    // The next attempt with a working transformer goes through.
    transformer.set_behaviour(Behaviour::Copy);
    assert!(h.pipeline.run(BuildRequest::new(5)).await.success);
    assert_eq!(marker(&h), Some(5));
    Ok(())
}

#[tokio::test]
async fn publish_failure_does_not_fail_the_build() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let setup = Setup {
        break_publish: true,
        ..Setup::default()
    };
    let (source, mut h) = scripted(&transformer, setup);
    source.set_version(2, &[("a.txt", "a")]);

    let outcome = h.pipeline.run(BuildRequest::new(2)).await;

    assert!(outcome.success);
    assert_eq!(marker(&h), Some(2));
    assert!(h.publish_dir.is_file());
    assert_eq!(read(h.dirs.staging_link.join("a.txt")), "a");
    Ok(())
}

/// `dir` holds exactly `files`, with the given contents.
fn assert_tree(dir: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        assert_eq!(read(dir.join(rel)), *contents, "{rel} in {dir:?}");
    }
    let found = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    assert_eq!(found, files.len(), "unexpected files in {dir:?}");
}

#[tokio::test]
async fn failure_between_swap_and_publish_leaves_both_trees_whole() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let (source, mut h) = scripted(&transformer, Setup::default());

    let v1 = [
        ("index.html", "one"),
        ("docs/guide.html", "guide one"),
        ("old.html", "gone in two"),
    ];
    let v2 = [
        ("index.html", "second"),
        ("docs/guide.html", "guide, second edition"),
        ("new.html", "added"),
    ];
    source.set_version(1, &v1);
    assert!(h.pipeline.run(BuildRequest::new(1)).await.success);

    // A directory where the marker file belongs makes the marker write fail
    // after the new tree is already live.
    let marker_path = h.dirs.root.join(revbuild::ledger::MARKER_FILE_NAME);
    fs::remove_file(&marker_path)?;
    fs::create_dir(&marker_path)?;

    source.set_version(2, &v2);
    let outcome = h.pipeline.run(BuildRequest::new(2)).await;

    assert!(!outcome.success);
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    assert_tree(&h.dirs.staging_link, &v2);
    assert_tree(&h.publish_dir, &v1);

    // Once the marker can be written the same version goes through.
    fs::remove_dir(&marker_path)?;
    fs::write(&marker_path, "1\n")?;
    assert!(h.pipeline.run(BuildRequest::new(2)).await.success);
    assert_eq!(marker(&h), Some(2));
    assert_tree(&h.dirs.staging_link, &v2);
    assert_tree(&h.publish_dir, &v2);
    Ok(())
}

#[tokio::test]
async fn publishing_can_be_disabled() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let setup = Setup {
        publish: false,
        ..Setup::default()
    };
    let (source, mut h) = scripted(&transformer, setup);
    source.set_version(1, &[("a.txt", "a")]);

    assert!(h.pipeline.run(BuildRequest::new(1)).await.success);
    assert!(!h.publish_dir.exists());
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_before_the_next_stage() -> TestResult {
    init_tracing();
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let (source, mut h) = scripted(&transformer, Setup::default());
    source.set_version(1, &[("a.txt", "a")]);

    h.shutdown.send(true)?;
    let outcome = h.pipeline.run(BuildRequest::new(1)).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap_or_default().contains("cancelled"));
    assert!(source.fetched().is_empty());
    assert_eq!(marker(&h), None);
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    Ok(())
}

#[tokio::test]
async fn snapshot_and_publish_follow_deletions_in_the_source() -> TestResult {
    init_tracing();
    let src = tempfile::tempdir()?;
    fs::create_dir_all(src.path().join("1/docs"))?;
    fs::write(src.path().join("1/keep.md"), "keep")?;
    fs::write(src.path().join("1/docs/old.md"), "old")?;
    fs::create_dir_all(src.path().join("2"))?;
    fs::write(src.path().join("2/keep.md"), "keep")?;

    let source = Arc::new(DirectorySource::open(SourceId::new("dir"), src.path()));
    let transformer = CopyTransformer::new(Behaviour::Copy);
    let mut h = harness(source, Box::new(transformer), Setup::default());

    assert!(h.pipeline.run(BuildRequest::new(1)).await.success);
    assert!(h.dirs.snapshot_dir.join("docs/old.md").exists());

    assert!(h.pipeline.run(BuildRequest::new(2)).await.success);
    assert!(!h.dirs.snapshot_dir.join("docs").exists());
    assert_eq!(read(h.dirs.snapshot_dir.join("keep.md")), "keep");
    assert_eq!(read(h.publish_dir.join("keep.md")), "keep");

    // The live tree and the one it replaced.
    let outputs: Vec<_> = fs::read_dir(&h.dirs.outputs_dir)?.collect();
    assert_eq!(outputs.len(), 2);
    Ok(())
}

#[tokio::test]
async fn shell_transformer_sees_the_build_environment() -> TestResult {
    use revbuild::pipeline::ShellTransformer;

    init_tracing();
    let source = ScriptedSource::new("shell");
    source.set_version(6, &[("in.txt", "payload")]);

    let cwd = tempfile::tempdir()?;
    let transformer = ShellTransformer::new(
        "cat \"$REVBUILD_SNAPSHOT_DIR/in.txt\" > \"$REVBUILD_OUTPUT_DIR/out.txt\" && \
         echo \"$REVBUILD_VERSION\" > \"$REVBUILD_OUTPUT_DIR/version.txt\"",
        cwd.path(),
    );
    let mut h = harness(Arc::new(source), Box::new(transformer), Setup::default());

    let outcome = h.pipeline.run(BuildRequest::new(6)).await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(read(h.dirs.staging_link.join("out.txt")), "payload");
    assert_eq!(read(h.dirs.staging_link.join("version.txt")).trim(), "6");
    Ok(())
}

#[tokio::test]
async fn missing_transformer_program_fails_even_when_exit_codes_are_tolerated() -> TestResult {
    use revbuild::pipeline::ShellTransformer;

    init_tracing();
    let source = ScriptedSource::new("missing-program");
    source.set_version(2, &[("in.txt", "payload")]);

    let cwd = tempfile::tempdir()?;
    let transformer = ShellTransformer::new("revbuild-no-such-program", cwd.path());
    let mut h = harness(Arc::new(source), Box::new(transformer), Setup::default());

    let outcome = h.pipeline.run(BuildRequest::new(2)).await;

    assert!(!outcome.success);
    assert_eq!(marker(&h), None);
    assert!(live_target(&h.dirs.staging_link).is_none());
    assert!(!h.publish_dir.exists());
    Ok(())
}
