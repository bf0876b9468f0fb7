//! Music-service links for ranked songs.
//!
//! Three providers are attached to every song row:
//!
//! | Provider | How | Can be empty |
//! |----------|-----|--------------|
//! | iTunes   | Search API, first result's `trackViewUrl` | yes |
//! | YouTube  | search-results URL built locally | no |
//! | Spotify  | search URL built locally | no |
//!
//! A failed iTunes lookup (transport error, bad JSON, zero results, timeout)
//! is an empty link, never an error for the caller. Providers are computed
//! independently of one another.

use crate::models::{LinkSet, Provider, ProviderLink, RankEntry, SongKey, SongRow};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const ITUNES_SEARCH_API: &str = "https://itunes.apple.com/search";
const YOUTUBE_RESULTS: &str = "https://www.youtube.com/results";
const SPOTIFY_SEARCH: &str = "https://open.spotify.com/search/";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid catalog URL: {0}")]
    Url(#[from] url::ParseError),
}

/// YouTube search-results URL for `song artist official video`.
pub fn youtube_search_url(song: &str, artist: &str) -> String {
    let query = format!("{song} {artist} official video");
    let params = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("search_query", &query)
        .append_pair("force_navigate", "1")
        .finish();
    format!("{YOUTUBE_RESULTS}?{params}")
}

/// Spotify search URL with `song artist` as a single path segment.
pub fn spotify_search_url(song: &str, artist: &str) -> String {
    let query = format!("{song} {artist}");
    format!("{SPOTIFY_SEARCH}{}", urlencoding::encode(&query))
}

/// A free-text catalog lookup returning the first hit's canonical page.
pub trait CatalogSearch {
    /// `Ok(None)` means the catalog answered with no results.
    async fn first_track_url(&self, query: &str) -> Result<Option<String>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct ItunesResponse {
    #[serde(rename = "resultCount", default)]
    result_count: usize,
    #[serde(default)]
    results: Vec<ItunesTrack>,
}

#[derive(Debug, Deserialize)]
struct ItunesTrack {
    #[serde(rename = "trackViewUrl")]
    track_view_url: Option<String>,
}

/// Extract the first `trackViewUrl` from an iTunes Search API body.
pub fn first_track_url_from_body(body: &str) -> Result<Option<String>, SearchError> {
    let resp: ItunesResponse = serde_json::from_str(body)?;
    if resp.result_count == 0 {
        return Ok(None);
    }
    Ok(resp
        .results
        .into_iter()
        .next()
        .and_then(|t| t.track_view_url)
        .filter(|u| !u.is_empty()))
}

/// iTunes Search API client.
#[derive(Debug, Clone)]
pub struct ItunesSearch {
    client: Client,
    api_base: Url,
    country: Option<String>,
}

impl ItunesSearch {
    /// Build an iTunes Search API client.
    ///
    /// # Arguments
    ///
    /// * `api_base` - search endpoint, normally [`ITUNES_SEARCH_API`]
    /// * `country` - storefront code (`"JP"`, `"US"`), or `None` for the API default
    /// * `timeout` - per-request timeout for the HTTP client
    ///
    /// # Returns
    ///
    /// The client, or [`SearchError::Url`] / [`SearchError::Http`] when the
    /// endpoint does not parse or the client cannot be built.
    pub fn new(
        api_base: &str,
        country: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
            country,
        })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.api_base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("term", query)
                .append_pair("media", "music")
                .append_pair("entity", "song")
                .append_pair("limit", "1");
            if let Some(country) = &self.country {
                pairs.append_pair("country", country);
            }
        }
        url
    }
}

impl CatalogSearch for ItunesSearch {
    #[instrument(level = "debug", skip(self))]
    async fn first_track_url(&self, query: &str) -> Result<Option<String>, SearchError> {
        let resp = self.client.get(self.search_url(query)).send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status()));
        }
        let body = resp.text().await?;
        first_track_url_from_body(&body)
    }
}

/// Caller-owned memo of catalog answers, keyed by query text.
///
/// Only definitive answers (a hit or an empty result set) are stored;
/// failures are retried on the next lookup.
pub type LinkCache = Arc<Mutex<HashMap<String, Option<String>>>>;

/// Attaches provider links to ranked songs.
pub struct Enricher<C> {
    catalog: Option<C>,
    timeout: Duration,
    cache: Option<LinkCache>,
}

impl<C: CatalogSearch> Enricher<C> {
    /// `catalog: None` disables the iTunes lookup; its link is then always empty.
    pub fn new(catalog: Option<C>, timeout: Duration) -> Self {
        Self {
            catalog,
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: LinkCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn cached(&self, query: &str) -> Option<Option<String>> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().ok()?;
        guard.get(query).cloned()
    }

    fn remember(&self, query: &str, result: &Option<String>) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.insert(query.to_string(), result.clone());
            }
        }
    }

    async fn itunes_link(&self, song: &str, artist: &str) -> Option<String> {
        let catalog = self.catalog.as_ref()?;
        let query = format!("{song} {artist}");

        if let Some(hit) = self.cached(&query) {
            debug!(%query, "Catalog cache hit");
            return hit;
        }

        let t0 = Instant::now();
        match tokio::time::timeout(self.timeout, catalog.first_track_url(&query)).await {
            Ok(Ok(result)) => {
                debug!(%query, found = result.is_some(), elapsed_ms = t0.elapsed().as_millis() as u64, "Catalog lookup done");
                self.remember(&query, &result);
                result
            }
            Ok(Err(e)) => {
                warn!(%query, error = %e, "Catalog lookup failed; leaving link empty");
                None
            }
            Err(_) => {
                warn!(%query, timeout = ?self.timeout, "Catalog lookup timed out; leaving link empty");
                None
            }
        }
    }

    /// Links for one song, one per provider.
    pub async fn enrich(&self, song: &str, artist: &str) -> LinkSet {
        let itunes = self.itunes_link(song, artist).await;
        let links = Provider::ALL
            .iter()
            .map(|&provider| {
                let url = match provider {
                    Provider::Itunes => itunes.clone(),
                    Provider::Youtube => Some(youtube_search_url(song, artist)),
                    Provider::Spotify => Some(spotify_search_url(song, artist)),
                };
                ProviderLink { provider, url }
            })
            .collect();
        LinkSet { links }
    }

    /// Enrich every entry with at most `concurrency` lookups in flight.
    ///
    /// Output order matches input order.
    #[instrument(level = "info", skip_all, fields(entries = entries.len(), concurrency))]
    pub async fn enrich_all(
        &self,
        entries: Vec<RankEntry<SongKey>>,
        concurrency: usize,
    ) -> Vec<SongRow> {
        let rows: Vec<SongRow> = stream::iter(entries)
            .map(|entry| async move {
                debug!(rank = entry.rank, label = %entry.label(), "Enriching song");
                let links = self.enrich(&entry.key.song, &entry.key.artist).await;
                SongRow { entry, links }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let with_itunes = rows
            .iter()
            .filter(|r| r.links.url(Provider::Itunes).is_some())
            .count();
        info!(rows = rows.len(), with_itunes, "Enriched song ranking");
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Catalog stub answering from a fixed table and counting calls.
    #[derive(Default)]
    struct StubCatalog {
        answers: HashMap<String, Option<String>>,
        fail: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl CatalogSearch for StubCatalog {
        async fn first_track_url(&self, query: &str) -> Result<Option<String>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
                return Err(SearchError::Decode(err));
            }
            Ok(self.answers.get(query).cloned().flatten())
        }
    }

    fn entry(rank: usize, song: &str, artist: &str) -> RankEntry<SongKey> {
        RankEntry {
            rank,
            key: SongKey::new(song, artist),
            count: 1,
        }
    }

    #[test]
    fn test_youtube_url() {
        assert_eq!(
            youtube_search_url("Shape of You", "Ed Sheeran"),
            "https://www.youtube.com/results?search_query=Shape+of+You+Ed+Sheeran+official+video&force_navigate=1"
        );
    }

    #[test]
    fn test_spotify_url() {
        assert_eq!(
            spotify_search_url("Shape of You", "Ed Sheeran"),
            "https://open.spotify.com/search/Shape%20of%20You%20Ed%20Sheeran"
        );
    }

    #[test]
    fn test_urls_escape_reserved_characters() {
        let yt = youtube_search_url("Rock & Roll", "AC/DC");
        assert!(yt.contains("Rock+%26+Roll+AC%2FDC"));
        let sp = spotify_search_url("夜に駆ける", "YOASOBI");
        assert!(sp.starts_with(SPOTIFY_SEARCH));
        assert!(!sp[SPOTIFY_SEARCH.len()..].contains('/'));
        assert!(sp.is_ascii());
    }

    #[test]
    fn test_first_track_url_from_body() {
        let body = r#"{"resultCount":1,"results":[{"trackViewUrl":"https://music.apple.com/jp/album/x?i=1"}]}"#;
        assert_eq!(
            first_track_url_from_body(body).unwrap().as_deref(),
            Some("https://music.apple.com/jp/album/x?i=1")
        );
    }

    #[test]
    fn test_first_track_url_no_results() {
        let body = r#"{"resultCount":0,"results":[]}"#;
        assert_eq!(first_track_url_from_body(body).unwrap(), None);
    }

    #[test]
    fn test_first_track_url_bad_json() {
        assert!(first_track_url_from_body("<html>busy</html>").is_err());
    }

    #[test]
    fn test_itunes_search_url_params() {
        let client = ItunesSearch::new(ITUNES_SEARCH_API, Some("JP".into()), Duration::from_secs(1))
            .unwrap();
        let url = client.search_url("Shape of You Ed Sheeran");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["term"], "Shape of You Ed Sheeran");
        assert_eq!(pairs["media"], "music");
        assert_eq!(pairs["entity"], "song");
        assert_eq!(pairs["limit"], "1");
        assert_eq!(pairs["country"], "JP");
    }

    #[tokio::test]
    async fn test_enrich_all_providers() {
        let mut catalog = StubCatalog::default();
        catalog.answers.insert(
            "Perfect Ed Sheeran".into(),
            Some("https://music.apple.com/perfect".into()),
        );
        let enricher = Enricher::new(Some(catalog), Duration::from_secs(1));
        let set = enricher.enrich("Perfect", "Ed Sheeran").await;

        assert_eq!(set.links.len(), 3);
        assert_eq!(set.url(Provider::Itunes), Some("https://music.apple.com/perfect"));
        assert!(set.url(Provider::Youtube).is_some());
        assert!(set.url(Provider::Spotify).is_some());
    }

    #[tokio::test]
    async fn test_catalog_failure_leaves_only_itunes_empty() {
        let catalog = StubCatalog {
            fail: true,
            ..Default::default()
        };
        let enricher = Enricher::new(Some(catalog), Duration::from_secs(1));
        let set = enricher.enrich("Perfect", "Ed Sheeran").await;

        assert_eq!(set.url(Provider::Itunes), None);
        assert!(set.url(Provider::Youtube).is_some());
        assert!(set.url(Provider::Spotify).is_some());
    }

    #[tokio::test]
    async fn test_catalog_timeout_is_no_result() {
        let catalog = StubCatalog {
            answers: HashMap::from([("a b".to_string(), Some("https://x".to_string()))]),
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let enricher = Enricher::new(Some(catalog), Duration::from_millis(10));
        assert_eq!(enricher.enrich("a", "b").await.url(Provider::Itunes), None);
    }

    #[tokio::test]
    async fn test_disabled_catalog() {
        let enricher: Enricher<StubCatalog> = Enricher::new(None, Duration::from_secs(1));
        let set = enricher.enrich("a", "b").await;
        assert_eq!(set.url(Provider::Itunes), None);
        assert!(set.url(Provider::Spotify).is_some());
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_lookups() {
        let catalog = StubCatalog::default();
        let cache: LinkCache = Arc::new(Mutex::new(HashMap::new()));
        let enricher =
            Enricher::new(Some(catalog), Duration::from_secs(1)).with_cache(cache.clone());

        enricher.enrich("a", "b").await;
        enricher.enrich("a", "b").await;

        let calls = enricher
            .catalog
            .as_ref()
            .map(|c| c.calls.load(Ordering::SeqCst));
        assert_eq!(calls, Some(1));
        assert_eq!(cache.lock().unwrap().get("a b"), Some(&None));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let catalog = StubCatalog {
            fail: true,
            ..Default::default()
        };
        let cache: LinkCache = Arc::new(Mutex::new(HashMap::new()));
        let enricher =
            Enricher::new(Some(catalog), Duration::from_secs(1)).with_cache(cache.clone());
        enricher.enrich("a", "b").await;
        assert!(cache.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enrich_all_preserves_order() {
        let catalog = StubCatalog::default();
        let enricher = Enricher::new(Some(catalog), Duration::from_secs(1));
        let entries = vec![entry(1, "x", "1"), entry(2, "y", "2"), entry(3, "z", "3")];

        let rows = enricher.enrich_all(entries, 2).await;
        let ranks: Vec<usize> = rows.iter().map(|r| r.entry.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(rows.iter().all(|r| r.links.links.len() == 3));
    }
}
