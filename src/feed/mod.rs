//! Message sources for on-air announcements.
//!
//! A source serves one date window as a sequence of pages. [`message_stream`]
//! turns that into a finite, lazy stream of [`RawMessage`]s that follows the
//! page cursor until the source reports no further page. Each call starts
//! over from the first page.
//!
//! # Sources
//!
//! | Module | What | Notes |
//! |--------|------|-------|
//! | [`x`] | Station account timeline on X (API v2) | Bearer token required |
//! | [`retry`] | Backoff decorator over any source | Retries 429/5xx/transport errors |
//!
//! A failed page fails the whole collection: a report is never built from
//! part of a window.

pub mod retry;
pub mod x;

use crate::models::RawMessage;
use crate::window::DateWindow;
use futures::stream::{self, Stream, TryStreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// HTTP 429, with the wait until the limit window resets when the feed
    /// says so.
    #[error("feed rate limit reached (resets in {reset_after:?}): {body}")]
    RateLimited {
        reset_after: Option<Duration>,
        body: String,
    },
    #[error("malformed feed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown account @{0}")]
    UnknownUser(String),
    #[error("no bearer token configured (set X_BEARER_TOKEN or feed.bearer_token)")]
    NoCredentials,
    #[error("invalid feed URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FeedError {
    /// Whether trying the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FeedError::Status { status, .. } => *status == 429 || *status >= 500,
            FeedError::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// How long the feed asked us to wait before the next request, if it did.
    pub fn reset_after(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimited { reset_after, .. } => *reset_after,
            _ => None,
        }
    }
}

/// One page of feed results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub messages: Vec<RawMessage>,
    /// Cursor for the following page, `None` on the last page.
    pub next_cursor: Option<String>,
}

/// A paginated feed of raw messages for a date window.
pub trait MessageSource {
    /// Fetch the page at `cursor` (`None` for the first page).
    async fn fetch_page(
        &self,
        window: &DateWindow,
        cursor: Option<&str>,
    ) -> Result<Page, FeedError>;
}

/// Lazily walk every page of `window`, yielding messages in feed order.
///
/// The stream ends after the first page without a cursor, or after the
/// first error.
pub fn message_stream<'a, S: MessageSource>(
    source: &'a S,
    window: &'a DateWindow,
) -> impl Stream<Item = Result<RawMessage, FeedError>> + 'a {
    // state: Some(cursor) = fetch that page next, None = exhausted
    stream::try_unfold(Some(None::<String>), move |state| async move {
        let Some(cursor) = state else {
            return Ok::<_, FeedError>(None);
        };
        let page = source.fetch_page(window, cursor.as_deref()).await?;
        let next = page.next_cursor.map(Some);
        Ok(Some((page.messages, next)))
    })
    .map_ok(|messages| stream::iter(messages.into_iter().map(Ok)))
    .try_flatten()
}

/// Collect every message in `window`. Any page failure aborts the collection.
#[instrument(level = "info", skip_all, fields(%window))]
pub async fn collect_messages<S: MessageSource>(
    source: &S,
    window: &DateWindow,
) -> Result<Vec<RawMessage>, FeedError> {
    if window.is_empty() {
        info!("Empty date window; nothing to fetch");
        return Ok(Vec::new());
    }
    let messages: Vec<RawMessage> = message_stream(source, window).try_collect().await?;
    info!(count = messages.len(), "Collected feed messages");
    Ok(messages)
}
