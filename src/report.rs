//! Report generation: fetch → parse → rank → enrich.
//!
//! Each call is an independent computation over one date window. The only
//! failure that reaches the caller is the feed failing; everything below
//! it (unparseable messages, failed catalog lookups) just leaves items out.

use crate::feed::{FeedError, MessageSource, collect_messages};
use crate::links::{CatalogSearch, Enricher};
use crate::models::Report;
use crate::parser;
use crate::ranking::{self, TieBreak};
use crate::window::DateWindow;
use std::time::Instant;
use tracing::{info, instrument};

/// Knobs for one report run.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub top: usize,
    pub tie_break: TieBreak,
    pub concurrency: usize,
}

/// Run the pipeline for one window: fetch, parse, rank, enrich.
///
/// # Arguments
///
/// * `source` - feed to read every page of `window` from
/// * `enricher` - attaches provider links to each ranked song
/// * `window` - date window to report on
/// * `options` - table size, tie-break policy and enrichment concurrency
///
/// # Returns
///
/// The assembled [`Report`]. Only a feed failure is an error; unparsable
/// messages are skipped and failed iTunes lookups leave that link empty.
#[instrument(level = "info", skip_all, fields(%window, top = options.top))]
pub async fn build_report<S, C>(
    source: &S,
    enricher: &Enricher<C>,
    window: DateWindow,
    options: ReportOptions,
) -> Result<Report, FeedError>
where
    S: MessageSource,
    C: CatalogSearch,
{
    let t0 = Instant::now();

    let messages = collect_messages(source, &window).await?;
    let announcements = parser::parse(&messages);

    let song_ranking = ranking::rank_songs(&announcements, options.top, options.tie_break);
    let artists = ranking::rank_artists(&announcements, options.top, options.tie_break);
    let songs = enricher.enrich_all(song_ranking, options.concurrency).await;

    info!(
        messages = messages.len(),
        announcements = announcements.len(),
        songs = songs.len(),
        artists = artists.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Report built"
    );

    Ok(Report {
        window,
        messages_fetched: messages.len(),
        announcements: announcements.len(),
        songs,
        artists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::tests::{PagedSource, window};
    use crate::links::SearchError;
    use crate::models::Provider;
    use std::time::Duration;

    struct EmptyCatalog;

    impl CatalogSearch for EmptyCatalog {
        async fn first_track_url(&self, _query: &str) -> Result<Option<String>, SearchError> {
            Ok(None)
        }
    }

    fn options() -> ReportOptions {
        ReportOptions {
            top: 30,
            tie_break: TieBreak::FirstSeen,
            concurrency: 4,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_ed_sheeran() {
        let source = PagedSource::new(vec![
            vec![
                r#""Shape of You" Ed Sheeran 14:05"#,
                "random tweet with no song info",
            ],
            vec![
                "「Shape of You」 Ed Sheeran 09:10",
                r#""Song" Artist 25:99"#,
                r#""Perfect" Ed Sheeran 03:00"#,
            ],
        ]);
        let enricher = Enricher::new(Some(EmptyCatalog), Duration::from_secs(1));

        let report = build_report(&source, &enricher, window(), options())
            .await
            .unwrap();

        assert_eq!(report.messages_fetched, 5);
        assert_eq!(report.announcements, 3);

        assert_eq!(report.songs.len(), 2);
        assert_eq!(report.songs[0].entry.label(), "Shape of You - Ed Sheeran");
        assert_eq!(report.songs[0].entry.count, 2);
        assert_eq!(report.songs[1].entry.label(), "Perfect - Ed Sheeran");
        assert_eq!(report.songs[1].entry.rank, 2);
        assert_eq!(report.songs[0].links.url(Provider::Itunes), None);
        assert!(report.songs[0].links.url(Provider::Youtube).is_some());

        assert_eq!(report.artists.len(), 1);
        assert_eq!(report.artists[0].key, "Ed Sheeran");
        assert_eq!(report.artists[0].count, 3);
    }

    #[tokio::test]
    async fn test_feed_failure_yields_no_report() {
        let mut source = PagedSource::new(vec![vec![r#""A" B 10:00"#], vec![]]);
        source.fail_at = Some(1);
        let enricher = Enricher::new(Some(EmptyCatalog), Duration::from_secs(1));

        let result = build_report(&source, &enricher, window(), options()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_no_announcements_gives_empty_tables() {
        let source = PagedSource::new(vec![vec!["good morning", "weather update"]]);
        let enricher = Enricher::new(Some(EmptyCatalog), Duration::from_secs(1));

        let report = build_report(&source, &enricher, window(), options())
            .await
            .unwrap();
        assert_eq!(report.messages_fetched, 2);
        assert!(report.songs.is_empty());
        assert!(report.artists.is_empty());
    }
}
