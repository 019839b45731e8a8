//! link-walker - Bounded-Concurrency Graph Walker
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use link_walker::config::{CliArgs, WalkConfig};
use link_walker::expand::{DirExpander, Expander, GraphExpander};
use link_walker::progress::{print_header, print_summary, ProgressReporter};
use link_walker::walker::WalkCoordinator;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = WalkConfig::from_args(&args).context("Invalid configuration")?;

    let (expander, source) = build_expander(&args)?;

    // Print header
    if config.show_progress {
        print_header(
            &source,
            config.max_depth,
            config.max_concurrency,
            config.worker_count,
        );
    }

    let show_progress = config.show_progress;
    let verbose = config.verbose;

    // Create coordinator
    let coordinator = WalkCoordinator::with_shared_expander(config, expander)
        .context("Failed to initialize walker")?;

    // Setup signal handler for graceful shutdown
    let cancel = coordinator.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        cancel.cancel();
    })
    .context("Failed to set signal handler")?;

    // Run the walk
    let result = if show_progress {
        let progress = ProgressReporter::new();
        progress.set_status("Starting walk...");

        let reporter = progress.clone();
        let result = coordinator
            .run_with_progress(args.start.clone(), move |p| reporter.update(p))
            .context("Walk failed")?;

        if result.cancelled {
            progress.finish("Walk interrupted");
        } else {
            progress.finish("Walk completed");
        }
        result
    } else {
        coordinator.run(args.start.clone()).context("Walk failed")?
    };

    for task_error in &result.errors {
        if verbose || !task_error.error.is_recoverable() {
            warn!(id = %task_error.id, depth = task_error.depth, error = %task_error.error, "Expansion failed");
        }
    }

    if args.list {
        for id in &result.visited {
            println!("{}", id);
        }
    }

    // Print summary
    if show_progress {
        print_summary(&result);
    }

    // Report success/failure
    if result.cancelled {
        info!("Walk was interrupted before completion");
    }

    if !result.errors.is_empty() {
        info!(errors = result.errors.len(), "Walk completed with errors");
    }

    Ok(())
}

/// Pick the expander for this invocation and describe the source
fn build_expander(args: &CliArgs) -> Result<(Arc<dyn Expander>, String)> {
    match &args.graph {
        Some(path) => {
            let mut graph = GraphExpander::load(path)
                .with_context(|| format!("Failed to load graph '{}'", path.display()))?;
            if let Some(ms) = args.delay_ms {
                graph = graph.with_delay(Duration::from_millis(ms));
            }

            info!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "Graph loaded"
            );
            let source = format!("{} (graph {})", args.start, path.display());
            let expander: Arc<dyn Expander> = Arc::new(graph);
            Ok((expander, source))
        }
        None => {
            let expander: Arc<dyn Expander> = Arc::new(
                DirExpander::new()
                    .include_files(args.files)
                    .follow_symlinks(args.follow_symlinks),
            );
            Ok((expander, args.start.clone()))
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("link_walker=debug,warn")
    } else {
        EnvFilter::new("link_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
