//! Announcement parsing.
//!
//! Station posts look like `「Shape of You」 Ed Sheeran 14:05` (corner
//! brackets) or, once normalized, `"Shape of You" Ed Sheeran 14:05`. The
//! song title is everything inside the delimiters, the artist is everything
//! up to the first `HH:MM` token that follows whitespace. The artist never
//! contains a title delimiter, so a post that lists several titles yields
//! the one directly followed by the time.
//!
//! Anything that does not fit is skipped. Most of the feed is not music
//! (programme promos, guest notices), so a miss is routine and only logged
//! at debug level.

use crate::models::{Announcement, RawMessage};
use crate::utils::truncate_for_log;
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

static ANNOUNCEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)(?:「([^」]+)」|"([^"]+)")\s+([^「」"]+?)\s+(\d{2}:\d{2})"#)
        .expect("announcement pattern is valid")
});

/// Why a message did not yield an [`Announcement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The text does not look like an on-air announcement.
    NoMatch,
    /// The time token is not a valid `HH:MM` time of day.
    BadTime,
    /// Song or artist is blank after trimming.
    EmptyField,
}

/// Parse one message.
pub fn parse_message(text: &str) -> Result<Announcement, Skip> {
    let caps = ANNOUNCEMENT_RE.captures(text).ok_or(Skip::NoMatch)?;

    let song = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    let artist = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
    let time = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

    let broadcast_time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| Skip::BadTime)?;

    if song.is_empty() || artist.is_empty() {
        return Err(Skip::EmptyField);
    }

    Ok(Announcement {
        song: song.to_string(),
        artist: artist.to_string(),
        broadcast_time,
    })
}

/// Parse a batch of messages, keeping input order and dropping misses.
///
/// Repeated plays stay repeated: they are what the ranking counts.
#[instrument(level = "info", skip_all, fields(messages = messages.len()))]
pub fn parse(messages: &[RawMessage]) -> Vec<Announcement> {
    let announcements: Vec<Announcement> = messages
        .iter()
        .filter_map(|msg| match parse_message(&msg.text) {
            Ok(a) => Some(a),
            Err(skip) => {
                debug!(?skip, text = %truncate_for_log(&msg.text, 80), "Skipping message");
                None
            }
        })
        .collect();

    info!(
        parsed = announcements.len(),
        skipped = messages.len() - announcements.len(),
        "Parsed announcements"
    );
    announcements
}
