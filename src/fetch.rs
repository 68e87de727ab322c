//! HTTP retrieval of feed documents and article pages.
//!
//! The module uses a small trait stack so transport, retry and pacing can be
//! tested independently:
//! - [`FetchAsync`]: core trait, one GET returning the body bytes
//! - [`HttpFetcher`]: `reqwest` transport with browser-like headers
//! - [`RetryFetch`]: decorator adding exponential backoff to any [`FetchAsync`]
//! - [`FeedFetcher`]: what the pipeline uses; paced + retried feed reads,
//!   single-attempt page reads
//!
//! # Retry Strategy
//!
//! - Only HTTP 429/500/502/503/504 and transport errors are retried
//! - `max_attempts` total tries (6 by default)
//! - Delay `base * 2^(retry-1)` (0.8s, 1.6s, 3.2s, ...) capped at `backoff_max`
//! - A server `Retry-After` hint replaces the computed delay

use crate::config::FetchPolicy;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Browser-like identification; some publishers soft-block obvious bots.
pub const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

const FEED_ACCEPT: &str = "application/rss+xml,application/xml;q=0.9,*/*;q=0.8";
const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// What is being fetched; selects the Accept header and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Feed,
    Page,
}

/// Trait for a single async GET.
pub trait FetchAsync {
    /// Fetch `url` and return the response body.
    ///
    /// Non-success statuses are errors.
    async fn get(&self, url: &str, resource: Resource) -> Result<Vec<u8>, FetchError>;
}

impl<T: FetchAsync> FetchAsync for &T {
    async fn get(&self, url: &str, resource: Resource) -> Result<Vec<u8>, FetchError> {
        (**self).get(url, resource).await
    }
}

/// `reqwest` transport shared by every request in a run.
///
/// Idle connections are never pooled and every request carries
/// `Connection: close`, so sockets are not kept open between requests.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    feed_timeout: Duration,
    page_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(policy: &FetchPolicy) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-CA,en;q=0.9"));
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .http1_only()
            .pool_max_idle_per_host(0)
            .connect_timeout(policy.timeout())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            feed_timeout: policy.timeout(),
            page_timeout: policy.page_timeout(),
        })
    }
}

impl FetchAsync for HttpFetcher {
    #[instrument(level = "debug", skip(self), fields(%url))]
    async fn get(&self, url: &str, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let (accept, timeout) = match resource {
            Resource::Feed => (FEED_ACCEPT, self.feed_timeout),
            Resource::Page => (PAGE_ACCEPT, self.page_timeout),
        };

        let t0 = Instant::now();
        let resp = self
            .client
            .get(parsed)
            .header(ACCEPT, accept)
            .timeout(timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            debug!(status = status.as_u16(), ?retry_after, "Non-success response");
            return Err(FetchError::Status {
                status: status.as_u16(),
                retry_after,
            });
        }

        let body = resp.bytes().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body.to_vec())
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - Utc::now()).to_std().ok()
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchAsync`].
pub struct RetryFetch<T> {
    inner: T,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: FetchAsync> RetryFetch<T> {
    pub fn new(inner: T, max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `retry` (1-based).
    fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let computed = self
            .base_delay
            .saturating_mul(1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX));
        hint.unwrap_or(computed).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: FetchAsync> FetchAsync for RetryFetch<T> {
    #[instrument(level = "info", skip(self), fields(%url))]
    async fn get(&self, url: &str, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match self.inner.get(url, resource).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if !err.is_transient() {
                warn!(attempt, error = %err, "Non-retryable fetch failure");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                error!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "Fetch exhausted retries"
                );
                return Err(err);
            }

            let delay = self.delay_for(attempt, err.retry_after());
            warn!(
                attempt,
                max = self.max_attempts,
                ?delay,
                error = %err,
                "Fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Feed and page retrieval with the run's politeness policy.
#[derive(Debug)]
pub struct FeedFetcher<T = HttpFetcher> {
    transport: T,
    policy: FetchPolicy,
}

impl FeedFetcher<HttpFetcher> {
    pub fn http(policy: FetchPolicy) -> Result<Self, FetchError> {
        let transport = HttpFetcher::new(&policy)?;
        Ok(Self::new(transport, policy))
    }
}

impl<T: FetchAsync> FeedFetcher<T> {
    pub fn new(transport: T, policy: FetchPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch a feed document: randomized pause, then a retried GET.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let pause = random_between(self.policy.pause_min_secs, self.policy.pause_max_secs);
        if !pause.is_zero() {
            debug!(?pause, "Polite pause before fetch");
            sleep(pause).await;
        }
        let retrying = RetryFetch::new(
            &self.transport,
            self.policy.max_attempts,
            self.policy.backoff_base(),
            self.policy.backoff_max(),
        );
        retrying.get(url, Resource::Feed).await
    }

    /// Fetch an article page once. No pause, no retries.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.transport.get(url, Resource::Page).await
    }
}

/// Jittered inter-section pause: `base * uniform(0.5, 1.5)`, at least `floor`.
pub fn section_pause(base: Duration, floor: Duration) -> Duration {
    let factor = if base.is_zero() { 1.0 } else { rng().random_range(0.5..1.5) };
    base.mul_f64(factor).max(floor)
}

fn random_between(min_secs: f64, max_secs: f64) -> Duration {
    let secs = if max_secs > min_secs {
        rng().random_range(min_secs..max_secs)
    } else {
        min_secs
    };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}


#[cfg(test)]
mod tests {
    use super::testing::{MockTransport, Reply};
    use super::*;

    const URL: &str = "https://www.cbc.ca/webfeed/rss/rss-topstories";

    fn fetcher(transport: MockTransport, max_attempts: u32) -> FeedFetcher<MockTransport> {
        let policy = FetchPolicy {
            max_attempts,
            ..FetchPolicy::immediate()
        };
        FeedFetcher::new(transport, policy)
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let transport = MockTransport::new().route(
            URL,
            vec![Reply::Status(503), Reply::Transport, Reply::Body(b"<rss/>".to_vec())],
        );
        let f = fetcher(transport, 6);
        assert_eq!(f.fetch(URL).await.unwrap(), b"<rss/>");
        assert_eq!(f.transport.call_count(URL), 3);
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let f = fetcher(MockTransport::new().route(URL, vec![Reply::Status(404)]), 6);
        let err = f.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(f.transport.call_count(URL), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let f = fetcher(MockTransport::new().route(URL, vec![Reply::Status(502)]), 4);
        let err = f.fetch(URL).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
        assert_eq!(f.transport.call_count(URL), 4);
    }

    #[tokio::test]
    async fn test_page_fetch_is_single_attempt() {
        let page = "https://www.cbc.ca/news/story-1";
        let f = fetcher(MockTransport::new().route(page, vec![Reply::Status(503)]), 6);
        assert!(f.fetch_page(page).await.is_err());
        assert_eq!(f.transport.calls(), vec![(page.to_string(), Resource::Page)]);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let r = RetryFetch::new(
            MockTransport::new(),
            6,
            Duration::from_millis(800),
            Duration::from_secs(5),
        );
        assert_eq!(r.delay_for(1, None), Duration::from_millis(800));
        assert_eq!(r.delay_for(2, None), Duration::from_millis(1600));
        assert_eq!(r.delay_for(3, None), Duration::from_millis(3200));
        assert_eq!(r.delay_for(4, None), Duration::from_secs(5));
        assert_eq!(r.delay_for(40, None), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_hint_wins() {
        let r = RetryFetch::new(
            MockTransport::new(),
            6,
            Duration::from_millis(800),
            Duration::from_secs(120),
        );
        assert_eq!(r.delay_for(1, Some(Duration::from_secs(7))), Duration::from_secs(7));
        assert_eq!(r.delay_for(1, Some(Duration::from_secs(600))), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 120 "), Some(Duration::from_secs(120)));
        // A date in the past yields no wait.
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_section_pause_bounds() {
        assert_eq!(section_pause(Duration::ZERO, Duration::ZERO), Duration::ZERO);
        assert_eq!(section_pause(Duration::ZERO, Duration::from_millis(500)), Duration::from_millis(500));
        for _ in 0..50 {
            let p = section_pause(Duration::from_secs(2), Duration::from_millis(500));
            assert!(p >= Duration::from_secs(1) && p <= Duration::from_secs(3), "{p:?}");
        }
    }

    #[test]
    fn test_random_between() {
        assert_eq!(random_between(0.0, 0.0), Duration::ZERO);
        for _ in 0..50 {
            let d = random_between(0.8, 2.0);
            assert!(d >= Duration::from_millis(800) && d < Duration::from_secs(2));
        }
    }
}
