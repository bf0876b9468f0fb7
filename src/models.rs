//! Data models for on-air announcements, rankings and report rows.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawMessage`]: Unparsed text as delivered by the feed
//! - [`Announcement`]: One parsed on-air play (song, artist, broadcast time)
//! - [`SongKey`]: Grouping identity for the song ranking
//! - [`RankEntry`]: One row of a ranking table
//! - [`Provider`], [`ProviderLink`], [`LinkSet`]: External search links per song
//! - [`Report`]: Everything handed to the presentation layer for one run

use crate::window::DateWindow;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw message as returned by the feed.
///
/// The feed's own posting time is not used; the broadcast time is embedded
/// in the text and recovered by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// The full message text, possibly spanning several lines.
    pub text: String,
}

impl RawMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A single parsed on-air play event.
///
/// `song` and `artist` are trimmed and non-empty. Instances only come out
/// of [`crate::parser`]; messages that fail to parse never produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub song: String,
    pub artist: String,
    /// Broadcast time of day.
    pub broadcast_time: NaiveTime,
}

impl Announcement {
    /// The grouping key used by the song ranking.
    pub fn song_key(&self) -> SongKey {
        SongKey::new(&self.song, &self.artist)
    }
}

/// Composite song identity.
///
/// Two announcements are the same song iff their labels (`song - artist`)
/// are identical, byte for byte. The parts are kept so enrichment never has
/// to split the label back apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SongKey {
    pub song: String,
    pub artist: String,
}

impl SongKey {
    pub fn new(song: &str, artist: &str) -> Self {
        Self {
            song: song.to_string(),
            artist: artist.to_string(),
        }
    }
}

impl fmt::Display for SongKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.song, self.artist)
    }
}

/// One row of a ranking table.
///
/// `rank` is positional (1-based) after sorting; equal counts still get
/// distinct consecutive ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry<K> {
    pub rank: usize,
    pub key: K,
    pub count: usize,
}

impl<K: fmt::Display> RankEntry<K> {
    /// Human-readable label of the ranked key.
    pub fn label(&self) -> String {
        self.key.to_string()
    }
}

/// External music services a ranked song is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Itunes,
    Youtube,
    Spotify,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Itunes, Provider::Youtube, Provider::Spotify];

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Itunes => "iTunes",
            Provider::Youtube => "YouTube",
            Provider::Spotify => "Spotify",
        }
    }
}

/// The outcome of one provider lookup. `url: None` is a normal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLink {
    pub provider: Provider,
    pub url: Option<String>,
}

/// Links for one ranked song, one entry per [`Provider`] in [`Provider::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSet {
    pub links: Vec<ProviderLink>,
}

impl LinkSet {
    /// URL for `provider`, if that lookup produced one.
    pub fn url(&self, provider: Provider) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.provider == provider)
            .and_then(|l| l.url.as_deref())
    }
}

/// A song ranking row after enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct SongRow {
    #[serde(flatten)]
    pub entry: RankEntry<SongKey>,
    pub links: LinkSet,
}

/// Output of one report generation.
///
/// Built fresh for each date window and discarded once rendered.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub window: DateWindow,
    /// Messages returned by the feed for the window.
    pub messages_fetched: usize,
    /// Messages that parsed into an [`Announcement`].
    pub announcements: usize,
    pub songs: Vec<SongRow>,
    pub artists: Vec<RankEntry<String>>,
}
