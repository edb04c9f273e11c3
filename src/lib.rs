// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_with_overrides, ConfigFile};
use crate::engine::{Runtime, RuntimeOptions, RunStats};
use crate::exec::{CommandTemplate, ScriptDispatcher};
use crate::fs::{FileSystem, RealFileSystem};
use crate::logging::{EventSink, TracingSink};
use crate::types::WatchMode;
use crate::watch::{DetectionStrategy, NotificationStrategy, PollingStrategy, Registry};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (CLI + optional TOML)
/// - the watched-file registry
/// - the detection strategy for the configured mode
/// - the script dispatcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_with_overrides(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let mut registry = Registry::new(cfg.mode);
    for path in &cfg.files {
        registry.register(fs.as_ref(), path)?;
    }

    // Ctrl-C → graceful shutdown.
    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            token.cancel();
        });
    }

    let options = RuntimeOptions {
        dispatch_on_startup: cfg.dispatch_on_startup,
        exit_after_startup: args.once,
    };
    let dispatcher = ScriptDispatcher::from_config(&cfg, sink.clone());

    let stats = match cfg.mode {
        WatchMode::Polling => {
            let strategy = PollingStrategy::new(fs.clone(), cfg.poll_interval);
            run_with(registry, strategy, dispatcher, fs, sink, options, shutdown).await?
        }
        WatchMode::Notify => {
            let strategy = NotificationStrategy::new(fs.clone());
            run_with(registry, strategy, dispatcher, fs, sink, options, shutdown).await?
        }
    };

    info!(
        dispatches = stats.dispatches,
        failed = stats.failed_dispatches,
        "filetrigger exiting"
    );
    Ok(())
}

async fn run_with<S: DetectionStrategy>(
    registry: Registry,
    strategy: S,
    dispatcher: ScriptDispatcher,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn EventSink>,
    options: RuntimeOptions,
    shutdown: CancellationToken,
) -> Result<RunStats> {
    let runtime = Runtime::new(registry, strategy, dispatcher, fs, sink, options);
    Ok(runtime.run(shutdown).await?)
}

/// Simple dry-run output: print the watch set and the command template.
fn print_dry_run(cfg: &ConfigFile) {
    let template = CommandTemplate::from_config(cfg);

    println!("filetrigger dry-run");
    println!("  watch.mode = {}", cfg.mode);
    if cfg.mode == WatchMode::Polling {
        println!("  watch.poll_interval = {:?}", cfg.poll_interval);
    }
    println!("  watch.dispatch_on_startup = {}", cfg.dispatch_on_startup);
    match cfg.script_timeout {
        Some(limit) => println!("  dispatch.timeout = {:?}", limit),
        None => println!("  dispatch.timeout = none"),
    }
    println!();

    println!("files ({}):", cfg.files.len());
    for path in &cfg.files {
        println!("  - {}", path.display());
        println!("      command: {}", template.display_line(path));
    }

    debug!("dry-run complete (nothing watched)");
}
