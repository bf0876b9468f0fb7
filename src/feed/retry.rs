//! Exponential backoff for feed page requests.
//!
//! [`RetrySource`] wraps any [`MessageSource`] and retries a page when the
//! error is transient (rate limiting, 5xx, timeouts, connection resets).
//! Permanent errors such as a bad token are returned straight away.
//!
//! # Retry Strategy
//!
//! - Up to `max_retries` retries after the first attempt
//! - Exponential backoff starting at `base_delay`
//! - Delay capped at 30 seconds
//! - Random jitter (0-250ms by default) added to each delay
//! - A rate-limited error that says when its window resets waits until then
//!   instead, capped at 15 minutes (X's rate-limit window)

use super::{FeedError, MessageSource, Page};
use crate::window::DateWindow;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Wrapper that adds exponential backoff retry logic to any [`MessageSource`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct RetrySource<S> {
    inner: S,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
    max_reset_wait: Duration,
}

impl<S: MessageSource> RetrySource<S> {
    /// Wrap `inner` with retries.
    ///
    /// # Arguments
    ///
    /// * `inner` - the source to retry
    /// * `max_retries` - retries after the first attempt; `0` disables them
    /// * `base_delay` - backoff before the first retry, doubled each time
    pub fn new(inner: S, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
            max_reset_wait: Duration::from_secs(15 * 60),
        }
    }

    fn jitter(&self) -> Duration {
        Duration::from_millis(rng().random_range(0..=self.max_jitter.as_millis() as u64))
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay);
        delay + self.jitter()
    }

    /// Wait before retrying after `err`: the rate-limit reset when the error
    /// carries one, exponential backoff otherwise.
    fn delay_after(&self, err: &FeedError, attempt: usize) -> Duration {
        match err.reset_after() {
            Some(wait) => wait.min(self.max_reset_wait) + self.jitter(),
            None => self.delay_for(attempt),
        }
    }
}

impl<S> fmt::Debug for RetrySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("max_reset_wait", &self.max_reset_wait)
            .finish()
    }
}

impl<S: MessageSource> MessageSource for RetrySource<S> {
    #[instrument(level = "debug", skip_all, fields(cursor = ?cursor))]
    async fn fetch_page(
        &self,
        window: &DateWindow,
        cursor: Option<&str>,
    ) -> Result<Page, FeedError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch_page(window, cursor).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() || attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            retryable = e.is_retryable(),
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "Feed page request failed"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_after(&e, attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Feed page attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
