// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod ledger;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch as shutdown};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_effective, ConfigFile};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::PipelineBackend;
use crate::ledger::{FileLedger, VersionLedger};
use crate::pipeline::{
    BuildPipeline, PipelineOptions, ShellTransformer, WorkingDirectories,
};
use crate::publish::{DirectoryPublisher, PublisherGate};
use crate::source::{ContentSource, DirectoryResolver, SourceResolver};
use crate::watch::{spawn_watcher, WatcherOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - source resolution and the per-source data directory
/// - version ledger, transformer, publisher and build pipeline
/// - update watcher
/// - runtime loop and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_effective(args.config.as_deref().map(Path::new))?;

    let data_dir = args
        .data_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.storage.data_dir.clone());
    let data_dir = std::path::absolute(&data_dir)
        .with_context(|| format!("resolving data dir {:?}", data_dir))?;

    let source = DirectoryResolver.resolve(&args.source)?;
    let dirs = WorkingDirectories::for_source(&data_dir, source.id());
    let share = args.share && cfg.publish.enabled;

    if args.dry_run {
        print_dry_run(&args, &cfg, source.as_ref(), &dirs, share);
        return Ok(());
    }

    dirs.ensure()
        .with_context(|| format!("creating working directories under {:?}", dirs.root))?;

    if let Err(err) = source.join_network() {
        warn!(error = %err, "could not join distribution network; continuing");
    }

    let ledger = FileLedger::new(source.id().clone(), &dirs.root);
    let marker = ledger.load()?;
    info!(
        source = %source.id(),
        marker = ?marker,
        current_version = source.current_version(),
        "source ready"
    );

    let (shutdown_tx, shutdown_rx) = shutdown::channel(false);
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let working_dir = cfg
        .build
        .working_dir
        .clone()
        .unwrap_or_else(|| dirs.root.clone());
    let transformer = ShellTransformer::new(cfg.build.command.clone(), working_dir);

    let publisher = share.then(|| {
        let target_dir = cfg
            .publish
            .target_dir
            .clone()
            .unwrap_or_else(|| dirs.publish_dir.clone());
        PublisherGate::new(
            Box::new(DirectoryPublisher::new(target_dir)),
            dirs.staging_link.clone(),
        )
    });

    let pipeline = BuildPipeline::new(
        Arc::clone(&source),
        Box::new(ledger),
        Box::new(transformer),
        publisher,
        dirs,
        PipelineOptions {
            fail_on_nonzero_exit: cfg.build.fail_on_nonzero_exit,
        },
        shutdown_rx,
    );
    let backend = PipelineBackend::new(pipeline, rt_tx.clone(), shutdown_tx);

    let _watcher = spawn_watcher(
        Arc::clone(&source),
        WatcherOptions::from(&cfg.watch),
        rt_tx.clone(),
    )?;

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        exit_when_idle: !args.subscribe,
    };
    let core = CoreRuntime::new(marker, options);
    let runtime = Runtime::new(core, rt_rx, backend);
    runtime.run().await?;
    Ok(())
}

/// Print what a run would use without touching the data directory.
fn print_dry_run(
    args: &CliArgs,
    cfg: &ConfigFile,
    source: &dyn ContentSource,
    dirs: &WorkingDirectories,
    share: bool,
) {
    println!("revbuild dry-run");
    println!("  source: {} (id {})", args.source, source.id());
    println!("  current version: {}", source.current_version());
    println!("  mode: {}", if args.subscribe { "subscribe" } else { "one-shot" });
    println!();

    println!("data:");
    println!("  root:     {}", dirs.root.display());
    println!("  snapshot: {}", dirs.snapshot_dir.display());
    println!("  output:   {}", dirs.output_dir.display());
    println!("  staging:  {}", dirs.staging_link.display());
    println!();

    println!("watch:");
    println!("  debounce: {:?}", cfg.watch.debounce());
    println!("  bootstrap timeout: {:?}", cfg.watch.bootstrap_timeout());

    println!("build:");
    println!("  command: {}", cfg.build.command);
    if let Some(ref dir) = cfg.build.working_dir {
        println!("  working_dir: {}", dir.display());
    }
    if cfg.build.fail_on_nonzero_exit {
        println!("  fail_on_nonzero_exit: true");
    }

    println!("publish:");
    if share {
        let target = cfg
            .publish
            .target_dir
            .as_deref()
            .unwrap_or(&dirs.publish_dir);
        println!("  target: {}", target.display());
    } else {
        println!("  disabled");
    }

    debug!("dry-run complete (no build)");
}
