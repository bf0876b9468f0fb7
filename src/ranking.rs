//! Play-count rankings.
//!
//! Songs are grouped by [`SongKey`], artists by their exact name. Groups
//! are sorted by descending play count and numbered 1..=n by position, so
//! equal counts get distinct consecutive ranks. How ties are ordered is a
//! [`TieBreak`] policy; both policies are deterministic for a given input.

use crate::models::{Announcement, RankEntry, SongKey};
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use tracing::{debug, instrument};

/// Number of rows kept in each ranking table.
pub const DEFAULT_TOP: usize = 30;

/// Ordering among entries with equal play counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The key seen first in the input ranks higher.
    #[default]
    FirstSeen,
    /// Labels compared as strings, ascending.
    Lexical,
}

/// Count occurrences of each key, in first-seen order.
fn count_first_seen<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts
}

/// Rank arbitrary keys by frequency.
pub fn rank_keys<K, I>(keys: I, top: usize, tie_break: TieBreak) -> Vec<RankEntry<K>>
where
    K: Eq + Hash + Clone + Display,
    I: IntoIterator<Item = K>,
{
    let counts = count_first_seen(keys);
    let distinct = counts.len();

    // sorted_by is stable, so FirstSeen falls out of the counting order
    let sorted = match tie_break {
        TieBreak::FirstSeen => counts
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect::<Vec<_>>(),
        TieBreak::Lexical => counts
            .into_iter()
            .map(|(k, c)| (k.to_string(), k, c))
            .sorted_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)))
            .map(|(_, k, c)| (k, c))
            .collect::<Vec<_>>(),
    };

    let ranked: Vec<RankEntry<K>> = sorted
        .into_iter()
        .take(top)
        .enumerate()
        .map(|(i, (key, count))| RankEntry {
            rank: i + 1,
            key,
            count,
        })
        .collect();

    debug!(distinct, kept = ranked.len(), ?tie_break, "Ranked keys");
    ranked
}

/// Rank songs (grouped by `song - artist`) by number of plays.
#[instrument(level = "info", skip_all, fields(announcements = announcements.len()))]
pub fn rank_songs(
    announcements: &[Announcement],
    top: usize,
    tie_break: TieBreak,
) -> Vec<RankEntry<SongKey>> {
    rank_keys(announcements.iter().map(Announcement::song_key), top, tie_break)
}

/// Rank artists by total number of plays across all their songs.
#[instrument(level = "info", skip_all, fields(announcements = announcements.len()))]
pub fn rank_artists(
    announcements: &[Announcement],
    top: usize,
    tie_break: TieBreak,
) -> Vec<RankEntry<String>> {
    rank_keys(
        announcements.iter().map(|a| a.artist.clone()),
        top,
        tie_break,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn play(song: &str, artist: &str) -> Announcement {
        Announcement {
            song: song.to_string(),
            artist: artist.to_string(),
            broadcast_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        }
    }

    fn labels<K: Display>(entries: &[RankEntry<K>]) -> Vec<String> {
        entries.iter().map(RankEntry::label).collect()
    }

    #[test]
    fn test_ed_sheeran_example() {
        let plays = vec![
            play("Shape of You", "Ed Sheeran"),
            play("Shape of You", "Ed Sheeran"),
            play("Perfect", "Ed Sheeran"),
        ];

        let songs = rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].rank, 1);
        assert_eq!(songs[0].label(), "Shape of You - Ed Sheeran");
        assert_eq!(songs[0].count, 2);
        assert_eq!(songs[1].rank, 2);
        assert_eq!(songs[1].label(), "Perfect - Ed Sheeran");
        assert_eq!(songs[1].count, 1);

        let artists = rank_artists(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].rank, 1);
        assert_eq!(artists[0].key, "Ed Sheeran");
        assert_eq!(artists[0].count, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_songs(&[], DEFAULT_TOP, TieBreak::FirstSeen).is_empty());
        assert!(rank_artists(&[], DEFAULT_TOP, TieBreak::Lexical).is_empty());
    }

    #[test]
    fn test_first_seen_tie_break() {
        let plays = vec![play("B", "x"), play("A", "x"), play("C", "y"), play("C", "y")];
        let songs = rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        assert_eq!(labels(&songs), vec!["C - y", "B - x", "A - x"]);
        assert_eq!(
            songs.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_lexical_tie_break() {
        let plays = vec![play("B", "x"), play("A", "x"), play("C", "y"), play("C", "y")];
        let songs = rank_songs(&plays, DEFAULT_TOP, TieBreak::Lexical);
        assert_eq!(labels(&songs), vec!["C - y", "A - x", "B - x"]);
    }

    #[test]
    fn test_truncates_to_top() {
        let plays: Vec<Announcement> = (0..45)
            .map(|i| play(&format!("Song {i}"), &format!("Artist {i}")))
            .collect();
        let songs = rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        assert_eq!(songs.len(), 30);
        assert_eq!(songs.last().unwrap().rank, 30);
        assert_eq!(rank_artists(&plays, 5, TieBreak::FirstSeen).len(), 5);
    }

    #[test]
    fn test_ranks_contiguous_and_counts_bounded() {
        let plays = vec![
            play("a", "1"),
            play("b", "2"),
            play("a", "1"),
            play("c", "1"),
            play("b", "2"),
            play("a", "1"),
        ];
        for tie_break in [TieBreak::FirstSeen, TieBreak::Lexical] {
            let songs = rank_songs(&plays, DEFAULT_TOP, tie_break);
            let ranks: Vec<usize> = songs.iter().map(|e| e.rank).collect();
            assert_eq!(ranks, (1..=songs.len()).collect::<Vec<_>>());
            assert!(songs.iter().map(|e| e.count).sum::<usize>() <= plays.len());
            assert!(songs.windows(2).all(|w| w[0].count >= w[1].count));
        }
    }

    #[test]
    fn test_same_title_different_artist_are_distinct_songs() {
        let plays = vec![play("Hello", "Adele"), play("Hello", "Lionel Richie")];
        assert_eq!(rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen).len(), 2);
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let plays = vec![play("x", "1"), play("y", "2"), play("z", "3"), play("y", "2")];
        let first = rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        let second = rank_songs(&plays, DEFAULT_TOP, TieBreak::FirstSeen);
        assert_eq!(first, second);
    }
}
