//! Station timeline on X, via the v2 API.
//!
//! Two endpoints are used:
//!
//! 1. `GET 2/users/by/username/{username}` once, to resolve the account id
//! 2. `GET 2/users/{id}/tweets` per page, bounded by `start_time`/`end_time`
//!    and walked with `pagination_token`
//!
//! Long posts carry their full text in `note_tweet`; that text is preferred
//! over the truncated `text` field.

use super::{FeedError, MessageSource, Page};
use crate::models::RawMessage;
use crate::window::DateWindow;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use url::Url;

pub const X_API_BASE: &str = "https://api.x.com/";

/// The API rejects an `end_time` closer than this to the present.
const END_TIME_MARGIN_SECS: i64 = 10;

/// Unix timestamp (seconds) at which the current rate-limit window resets.
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Post>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Post {
    text: String,
    note_tweet: Option<NoteTweet>,
}

#[derive(Debug, Deserialize)]
struct NoteTweet {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

/// Decode one timeline page body.
fn page_from_body(body: &str) -> Result<Page, FeedError> {
    let resp: TimelineResponse = serde_json::from_str(body)?;
    let messages = resp
        .data
        .into_iter()
        .map(|p| RawMessage::new(p.note_tweet.map(|n| n.text).unwrap_or(p.text)))
        .collect();
    Ok(Page {
        messages,
        next_cursor: resp.meta.next_token,
    })
}

/// `end_time` for a window, pulled back from the present when needed.
fn clamp_end(end: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    end.min(now - ChronoDuration::seconds(END_TIME_MARGIN_SECS))
}

/// Whether any part of `window` lies far enough in the past to be queried.
fn has_queryable_range(window: &DateWindow, now: DateTime<Utc>) -> bool {
    clamp_end(window.end_utc(), now) > window.start_utc()
}

/// Wait until the rate-limit window resets, from the reset header value.
///
/// A missing or unparsable header gives `None`; a reset already in the past
/// gives a zero wait.
fn reset_wait(header: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let reset = header?.trim().parse::<i64>().ok()?;
    let reset = DateTime::<Utc>::from_timestamp(reset, 0)?;
    Some((reset - now).to_std().unwrap_or(Duration::ZERO))
}

/// Timeline client for one account.
#[derive(Debug)]
pub struct XTimeline {
    client: Client,
    api_base: Url,
    bearer_token: String,
    username: String,
    page_size: u32,
    user_id: OnceCell<String>,
}

impl XTimeline {
    /// Build a timeline client for one account.
    ///
    /// # Arguments
    ///
    /// * `api_base` - API root, normally [`X_API_BASE`]
    /// * `bearer_token` - app bearer token; blank counts as missing
    /// * `username` - account handle, with or without the leading `@`
    /// * `page_size` - posts per page, clamped to the endpoint's 5..=100
    /// * `timeout` - per-request timeout for the HTTP client
    ///
    /// # Errors
    ///
    /// [`FeedError::NoCredentials`] without a token, [`FeedError::Url`] for a
    /// bad `api_base`, and [`FeedError::Http`] if the client cannot be built.
    /// No request is made here; the account id is resolved on first fetch.
    pub fn new(
        api_base: &str,
        bearer_token: Option<String>,
        username: &str,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let bearer_token = bearer_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(FeedError::NoCredentials)?;
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
            bearer_token,
            username: username.trim_start_matches('@').to_string(),
            // the endpoint accepts 5..=100
            page_size: page_size.clamp(5, 100),
            user_id: OnceCell::new(),
        })
    }

    async fn get(&self, url: Url) -> Result<String, FeedError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        let status = resp.status();
        let reset_after = reset_wait(
            resp.headers()
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|v| v.to_str().ok()),
            Utc::now(),
        );
        let body = resp.text().await?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited { reset_after, body });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn lookup_user_id(&self) -> Result<String, FeedError> {
        let url = self
            .api_base
            .join(&format!("2/users/by/username/{}", self.username))?;
        let body = self.get(url).await?;
        let lookup: UserLookup = serde_json::from_str(&body)?;
        let id = lookup
            .data
            .map(|u| u.id)
            .ok_or_else(|| FeedError::UnknownUser(self.username.clone()))?;
        info!(username = %self.username, %id, "Resolved feed account");
        Ok(id)
    }

    /// Account id, looked up on first use.
    async fn user_id(&self) -> Result<&str, FeedError> {
        let id = self
            .user_id
            .get_or_try_init(|| self.lookup_user_id())
            .await?;
        Ok(id.as_str())
    }

    fn timeline_url(
        &self,
        user_id: &str,
        window: &DateWindow,
        cursor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Url, FeedError> {
        let mut url = self.api_base.join(&format!("2/users/{user_id}/tweets"))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("max_results", &self.page_size.to_string())
                .append_pair(
                    "start_time",
                    &window.start_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .append_pair(
                    "end_time",
                    &clamp_end(window.end_utc(), now).to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .append_pair("tweet.fields", "created_at,note_tweet");
            if let Some(token) = cursor {
                pairs.append_pair("pagination_token", token);
            }
        }
        Ok(url)
    }
}

impl MessageSource for XTimeline {
    #[instrument(level = "info", skip_all, fields(username = %self.username, cursor = ?cursor))]
    async fn fetch_page(
        &self,
        window: &DateWindow,
        cursor: Option<&str>,
    ) -> Result<Page, FeedError> {
        let now = Utc::now();
        if !has_queryable_range(window, now) {
            debug!(%window, "Window starts too close to the present; nothing to fetch");
            return Ok(Page::default());
        }
        let user_id = self.user_id().await?;
        let url = self.timeline_url(user_id, window, cursor, now)?;
        let body = self.get(url).await?;
        let page = page_from_body(&body)?;
        debug!(
            count = page.messages.len(),
            has_next = page.next_cursor.is_some(),
            "Fetched timeline page"
        );
        Ok(page)
    }
}
