//! Runtime configuration.
//!
//! Settings come from three layers, highest precedence first:
//!
//! 1. Command-line flags and their environment variables ([`crate::cli::Cli`])
//! 2. An optional YAML file passed with `--config`
//! 3. Built-in defaults
//!
//! The resolved [`Settings`] value is built once in `main` and handed to the
//! feed and catalog constructors; nothing reads configuration globally.
//!
//! # Example file
//!
//! ```yaml
//! feed:
//!   username: jwave
//!   page_size: 100
//! itunes:
//!   country: JP
//! report:
//!   top: 30
//!   tie_break: lexical
//! ```

use crate::cli::{Cli, OutputFormat};
use crate::feed::x::X_API_BASE;
use crate::links::ITUNES_SEARCH_API;
use crate::ranking::{DEFAULT_TOP, TieBreak};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub api_base: String,
    pub bearer_token: Option<String>,
    pub username: String,
    pub page_size: u32,
    pub max_retries: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            api_base: X_API_BASE.to_string(),
            bearer_token: None,
            username: "jwave".to_string(),
            page_size: 100,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ItunesSettings {
    pub enabled: bool,
    pub api_base: String,
    pub country: Option<String>,
}

impl Default for ItunesSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: ITUNES_SEARCH_API.to_string(),
            country: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub top: usize,
    pub tie_break: TieBreak,
    /// Maximum catalog lookups in flight.
    pub concurrency: usize,
    /// Per-request timeout for feed and catalog calls.
    pub timeout_secs: u64,
    pub format: OutputFormat,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top: DEFAULT_TOP,
            tie_break: TieBreak::default(),
            concurrency: 8,
            timeout_secs: 10,
            format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub itunes: ItunesSettings,
    pub report: ReportSettings,
}

impl Settings {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml(yaml: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let settings = Self::from_yaml(&yaml, &display)?;
        info!("Loaded configuration file");
        Ok(settings)
    }

    /// Resolve settings: config file (if any), then CLI overrides on top.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };
        settings.apply_cli(cli);
        Ok(settings)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(token) = &cli.bearer_token {
            self.feed.bearer_token = Some(token.clone());
        }
        if let Some(username) = &cli.username {
            self.feed.username = username.clone();
        }
        if cli.no_itunes {
            self.itunes.enabled = false;
        }
        if let Some(country) = &cli.itunes_country {
            self.itunes.country = Some(country.clone());
        }
        if let Some(top) = cli.top {
            self.report.top = top;
        }
        if let Some(tie_break) = cli.tie_break {
            self.report.tie_break = tie_break;
        }
        if let Some(concurrency) = cli.concurrency {
            self.report.concurrency = concurrency;
        }
        if let Some(secs) = cli.timeout_secs {
            self.report.timeout_secs = secs;
        }
        if let Some(format) = cli.format {
            self.report.format = format;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.report.timeout_secs.max(1))
    }
}
