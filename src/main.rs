//! CLI entry point for the media downloader.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_util::future::join_all;
use media_downloader::download::constants::{CONNECT_TIMEOUT_SECS, PROGRESS_RETAIN};
use media_downloader::download::{DirectorySaveAs, DirectorySaver};
use media_downloader::{HttpClient, MediaKind, RangeDownloadEngine};
use tracing::{debug, info, warn};

mod app;
mod cli;

use app::config::load_default_file_config;
use app::progress_ui::IndicatifReporter;
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let config = load_default_file_config()?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => config.verbosity.map_or("info", |v| v.filter()),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, ?config, "CLI arguments and config loaded");

    // Read input: from positional args or stdin
    let input_text = if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        buffer
    } else {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/stream/42' | media-downloader");
        return Ok(());
    };

    let urls: Vec<&str> = input_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let output_dir = args
        .output_dir
        .clone()
        .or(config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let connect_timeout = args
        .connect_timeout
        .or(config.connect_timeout_secs)
        .unwrap_or(CONNECT_TIMEOUT_SECS);
    let read_timeout = args.read_timeout.or(config.read_timeout_secs);
    let save_as_enabled = !args.no_save_as && config.save_as.unwrap_or(true);
    let retain = config
        .progress_retain_secs
        .map_or(PROGRESS_RETAIN, Duration::from_secs);

    let client = HttpClient::with_timeouts(connect_timeout, read_timeout)
        .context("Failed to build HTTP client")?;
    let transport = Arc::new(client);
    let saver = Arc::new(DirectorySaver::new(&output_dir));
    let save_as = Arc::new(DirectorySaveAs::new(&output_dir).with_enabled(save_as_enabled));
    let reporter = Arc::new(IndicatifReporter::new(
        retain,
        !args.quiet && io::stderr().is_terminal(),
    ));

    let engine_for = |kind: MediaKind| {
        RangeDownloadEngine::new(kind, transport.clone(), saver.clone(), reporter.clone())
            .with_save_as(save_as.clone())
    };
    let video = engine_for(MediaKind::Video);
    let audio = engine_for(MediaKind::Audio);

    info!(
        urls = urls.len(),
        output_dir = %output_dir.display(),
        save_as = save_as_enabled,
        "Starting downloads"
    );

    let sessions = urls.iter().map(|url| {
        let engine = match args.kind.resolve(url) {
            MediaKind::Video => &video,
            MediaKind::Audio => &audio,
        };
        engine.download(url)
    });
    let outcomes: Vec<_> = join_all(sessions).await.into_iter().flatten().collect();

    // Buffered saves run in the background; wait for them before exiting.
    let save_failures = saver.flush().await;

    let completed = outcomes
        .iter()
        .filter(|o| o.is_completed())
        .count()
        .saturating_sub(save_failures);
    let failed = outcomes.len() - completed;
    for outcome in outcomes.iter().filter(|o| o.is_completed()) {
        if let Some(path) = &outcome.saved_as {
            debug!(path = %path.display(), "Saved");
        }
    }
    for outcome in outcomes.iter().filter(|o| !o.is_completed()) {
        if let Some(error) = &outcome.error {
            warn!(file_name = %outcome.file_name, state = outcome.state.as_str(), %error, "Not downloaded");
        }
    }

    info!(
        completed,
        failed,
        total = outcomes.len(),
        "Download complete"
    );

    if failed > 0 {
        bail!("{failed} of {} downloads did not complete", outcomes.len());
    }
    Ok(())
}
