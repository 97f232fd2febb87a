//! sitefreeze CLI - static-site export for headless-CMS frontends.
//!
//! This is the entry point for the `sitefreeze` command. It assembles an
//! export configuration from flags and environment, runs the pipeline from
//! `sitefreeze-core`, and maps the report onto the process exit code:
//! `0` for a clean export, `1` when any page failed or the run aborted,
//! `130` when interrupted by a signal.

use anyhow::Result;
use clap::Parser;
use sitefreeze_core::Exporter;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let quiet = cli.quiet;
    let config = cli.into_config()?;
    let exporter = Exporter::new(config);

    let progress = output::crawl_progress(quiet);
    // Racing against the signal means an interrupt drops the export future,
    // which tears down any managed preview process group before exit.
    let outcome = tokio::select! {
        result = exporter.run_with_progress(|path, _ok| {
            progress.set_message(path.to_string());
            progress.inc(1);
        }) => Some(result),
        () = shutdown_signal() => None,
    };
    progress.finish_and_clear();

    // The select statement has ended, so the export future and with it the
    // preview handle are gone by the time the process exits.
    let Some(result) = outcome else {
        tracing::warn!("interrupted; preview server stopped");
        std::process::exit(130);
    };
    let report = result?;

    output::print_summary(&report, quiet);

    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Resolves when the process receives SIGINT or, on Unix, SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = term.recv() => {},
            }
        },
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        },
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
