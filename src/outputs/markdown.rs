//! Markdown rendering of a report.
//!
//! ```text
//! # On-air ranking 20240101..20240131
//!
//! 1234 messages, 987 announcements
//!
//! ## Songs
//!
//! | Rank | Song | Artist | Plays | Listen |
//! |---:|---|---|---:|---|
//! | 1 | Shape of You | Ed Sheeran | 12 | [YouTube](…) · [Spotify](…) |
//!
//! ## Artists
//! ...
//! ```

use crate::models::{Provider, Report, SongRow};
use std::fmt::Write;

/// Make a value safe to place inside a table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn listen_links(row: &SongRow) -> String {
    let links: Vec<String> = Provider::ALL
        .iter()
        .filter_map(|&p| {
            row.links
                .url(p)
                .map(|url| format!("[{}]({})", p.display_name(), url))
        })
        .collect();
    if links.is_empty() {
        "-".to_string()
    } else {
        links.join(" · ")
    }
}

/// Render a report as Markdown: a heading, a summary line, then the song and
/// artist tables.
///
/// # Arguments
///
/// * `report` - the report to render
///
/// # Returns
///
/// The document as a `String`. Empty tables are replaced by a one-line note,
/// and songs without any link show `-` in the Listen column.
pub fn report_to_markdown(report: &Report) -> String {
    let mut md = String::new();

    writeln!(md, "# On-air ranking {}\n", report.window).unwrap();
    writeln!(
        md,
        "{} messages, {} announcements\n",
        report.messages_fetched, report.announcements
    )
    .unwrap();

    writeln!(md, "## Songs\n").unwrap();
    if report.songs.is_empty() {
        writeln!(md, "_No songs announced in this window._\n").unwrap();
    } else {
        writeln!(md, "| Rank | Song | Artist | Plays | Listen |").unwrap();
        writeln!(md, "|---:|---|---|---:|---|").unwrap();
        for row in &report.songs {
            writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                row.entry.rank,
                cell(&row.entry.key.song),
                cell(&row.entry.key.artist),
                row.entry.count,
                listen_links(row)
            )
            .unwrap();
        }
        md.push('\n');
    }

    writeln!(md, "## Artists\n").unwrap();
    if report.artists.is_empty() {
        writeln!(md, "_No artists announced in this window._").unwrap();
    } else {
        writeln!(md, "| Rank | Artist | Plays |").unwrap();
        writeln!(md, "|---:|---|---:|").unwrap();
        for entry in &report.artists {
            writeln!(md, "| {} | {} | {} |", entry.rank, cell(&entry.key), entry.count).unwrap();
        }
    }

    md
}
