//! CLI entry point for docfetch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use docfetch_core::{BatchSummary, FetchEngine, ResultRecord, build_tasks};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod input;

use cli::Args;

/// Process outcome mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Every record is error-free.
    Success,
    /// At least one record carries an error.
    Partial,
}

impl From<ProcessExit> for ExitCode {
    fn from(outcome: ProcessExit) -> Self {
        match outcome {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = app_config::load_file_config(args.config.as_deref());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > info
    let default_level = app_config::default_log_level(
        &args,
        loaded.as_ref().ok().and_then(|l| l.config.as_ref()),
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let loaded = loaded?;
    if let Some(path) = loaded.path.as_deref() {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "config file");
    }
    let file_config = loaded.config.unwrap_or_default();
    debug!(?args, "CLI arguments parsed");

    let Some(input_text) = input::read_input_text(&args.urls, args.input.as_deref())? else {
        info!("No input provided. Pass URLs as arguments, with --input, or via stdin.");
        info!("Example: echo 'https://example.com/doc.zip' | docfetch");
        return Ok(ProcessExit::Success.into());
    };

    let url_list = input::parse_url_lines(&input_text);
    for rejected in &url_list.rejected {
        warn!(line = %rejected, "Skipped input line that is not an http(s) URL");
    }
    if url_list.urls.is_empty() {
        info!("No valid URLs found in input");
        return Ok(ProcessExit::Success.into());
    }

    let settings = app_config::resolve_run_settings(&args, &file_config);
    let tasks = build_tasks(&url_list.urls);
    info!(
        urls = tasks.len(),
        output_dir = %settings.output_dir.display(),
        "Parsed input"
    );

    let progress = progress_bar(tasks.len(), args.quiet);
    let progress_for_engine = progress.clone();
    let engine = FetchEngine::new(settings.fetch)?.with_progress(move |record| {
        progress_for_engine.inc(1);
        if let Some(error) = &record.error {
            progress_for_engine.println(format!("failed: {} ({error})", record.url));
        }
    });

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight transfers. Run again to resume.");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let records = engine.fetch_all(tasks, &settings.output_dir).await?;
    progress.finish_and_clear();

    let summary = BatchSummary::from_records(&records);
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total(),
        "Download complete"
    );

    if let Some(report) = args.report.as_deref() {
        write_report(report, &records)?;
    }

    let outcome = if summary.has_failures() {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    };
    Ok(outcome.into())
}

fn progress_bar(total: usize, quiet: bool) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn write_report(path: &Path, records: &[ResultRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize report")?;
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}")?;
        return Ok(());
    }
    fs::write(path, json)
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    debug!(path = %path.display(), "report written");
    Ok(())
}
