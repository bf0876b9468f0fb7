//! Command-line interface definitions.
//!
//! Every option except the dates can also come from the YAML config file;
//! flags given here win over the file.

use crate::ranking::TieBreak;
use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// How the report is written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Rank the songs and artists a radio station announced on-air over a date range.
///
/// # Examples
///
/// ```sh
/// # Last 30 days
/// X_BEARER_TOKEN=... onair_ranking
///
/// # A fixed window, as JSON
/// onair_ranking -s 20240101 -e 20240201 --format json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// First day of the window, YYYYMMDD (default: 30 days before today)
    #[arg(short, long)]
    pub start_date: Option<String>,

    /// Day after the last day of the window, YYYYMMDD (default: today)
    #[arg(short, long)]
    pub end_date: Option<String>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// X API bearer token
    #[arg(long, env = "X_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Station account to read (default: jwave)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Rows per ranking table (default: 30)
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Ordering among equal play counts (default: first-seen)
    #[arg(long, value_enum)]
    pub tie_break: Option<TieBreak>,

    /// Maximum concurrent iTunes lookups (default: 8)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request network timeout in seconds (default: 10)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip iTunes lookups entirely
    #[arg(long)]
    pub no_itunes: bool,

    /// iTunes storefront country code, e.g. JP
    #[arg(long)]
    pub itunes_country: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}
