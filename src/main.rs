//! # On-air Ranking
//!
//! Ranks the songs and artists a radio station announced on-air during a
//! date window. The station posts one message per play on its social feed
//! (`「Song」 Artist 14:05`); those posts are parsed, counted, and the top
//! entries are linked to iTunes, YouTube and Spotify.
//!
//! ## Usage
//!
//! ```sh
//! X_BEARER_TOKEN=... onair_ranking -s 20240101 -e 20240201
//! ```
//!
//! ## Architecture
//!
//! One linear pipeline per run:
//! 1. **Fetching**: Walk the feed's pages for the window (with backoff)
//! 2. **Parsing**: Extract (song, artist, time) from each message, skipping misses
//! 3. **Ranking**: Count plays per song and per artist, keep the top N
//! 4. **Enrichment**: Attach provider links (iTunes lookups, bounded concurrency)
//! 5. **Output**: Markdown or JSON on stdout; logs go to stderr

use chrono::Local;
use clap::Parser;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod feed;
mod links;
mod models;
mod outputs;
mod parser;
mod ranking;
mod report;
mod utils;
mod window;

use cli::{Cli, OutputFormat};
use config::Settings;
use feed::retry::RetrySource;
use feed::x::XTimeline;
use links::{Enricher, ItunesSearch, LinkCache};
use outputs::{json, markdown};
use report::{ReportOptions, build_report};
use window::DateWindow;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init (stderr; stdout carries the report) ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("onair_ranking starting up");

    let args = Cli::parse();
    debug!(?args.start_date, ?args.end_date, ?args.config, "Parsed CLI arguments");

    let settings = Settings::resolve(&args)?;
    let window = DateWindow::from_inputs(
        args.start_date.as_deref(),
        args.end_date.as_deref(),
        Local::now().date_naive(),
    )?;
    info!(
        %window,
        username = %settings.feed.username,
        top = settings.report.top,
        tie_break = ?settings.report.tie_break,
        itunes = settings.itunes.enabled,
        "Resolved settings"
    );

    // ---- Collaborators ----
    let timeout = settings.timeout();
    let timeline = XTimeline::new(
        &settings.feed.api_base,
        settings.feed.bearer_token.clone(),
        &settings.feed.username,
        settings.feed.page_size,
        timeout,
    )?;
    let source = RetrySource::new(timeline, settings.feed.max_retries, Duration::from_secs(1));

    let catalog = if settings.itunes.enabled {
        Some(ItunesSearch::new(
            &settings.itunes.api_base,
            settings.itunes.country.clone(),
            timeout,
        )?)
    } else {
        None
    };
    let cache: LinkCache = Arc::new(Mutex::new(HashMap::new()));
    let enricher = Enricher::new(catalog, timeout).with_cache(cache);

    let options = ReportOptions {
        top: settings.report.top,
        tie_break: settings.report.tie_break,
        concurrency: settings.report.concurrency,
    };

    // ---- Build ----
    let report = match build_report(&source, &enricher, window, options).await {
        Ok(report) => report,
        Err(e) => {
            error!(%window, error = %e, "Could not fetch the feed; no report produced");
            return Err(e.into());
        }
    };

    // ---- Output ----
    let rendered = match settings.report.format {
        OutputFormat::Markdown => markdown::report_to_markdown(&report),
        OutputFormat::Json => json::report_to_json(&report)?,
    };
    println!("{rendered}");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        songs = report.songs.len(),
        artists = report.artists.len(),
        "Execution complete"
    );

    Ok(())
}
