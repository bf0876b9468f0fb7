//! Report date windows.
//!
//! Dates are entered as `YYYYMMDD`. The window covers `start` (inclusive)
//! up to `end` (exclusive), both at 00:00 UTC, the same way the feed's
//! `since`/`until` filters behave.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Default length of the trailing window when no start date is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid date {0:?}: expected YYYYMMDD")]
    BadDate(String),
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a window from optional `YYYYMMDD` inputs.
    ///
    /// A missing `end` means `today`; a missing `start` means
    /// [`DEFAULT_WINDOW_DAYS`] days before `today`.
    pub fn from_inputs(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, WindowError> {
        let end = match end {
            Some(s) => parse_yyyymmdd(s)?,
            None => today,
        };
        let start = match start {
            Some(s) => parse_yyyymmdd(s)?,
            None => today - Duration::days(DEFAULT_WINDOW_DAYS),
        };
        Self::new(start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Parse a `YYYYMMDD` date string.
pub fn parse_yyyymmdd(s: &str) -> Result<NaiveDate, WindowError> {
    let trimmed = s.trim();
    // chrono accepts fewer digits for %Y, so pin the width first
    if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WindowError::BadDate(s.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| WindowError::BadDate(s.to_string()))
}
