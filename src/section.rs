//! Per-feed processing: fetch → parse → filter → normalize → bias-tag → truncate.
//!
//! A section never fails the run. Fetch and parse failures are logged and
//! yield an empty result; entries without a usable date or outside the
//! recency window are dropped one by one.

use crate::bias::BiasHeuristic;
use crate::config::SectionConfig;
use crate::dates;
use crate::fetch::{FeedFetcher, FetchAsync};
use crate::models::{ArticleRecord, RawEntry};
use crate::scrapers::{article, feed};
use crate::summarize::{clean_text, summarize};
use crate::utils::{stable_id, truncate_for_log};
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, error, info, instrument, warn};

/// Date fields in priority order; the first non-empty one is used.
pub const DATE_FIELDS: [&str; 4] = ["published", "updated", "pubDate", "date"];
const SUMMARY_FIELDS: [&str; 2] = ["summary", "description"];

pub struct SectionProcessor<'a, T> {
    fetcher: &'a FeedFetcher<T>,
    bias: &'a BiasHeuristic,
    timezone: Tz,
    summary_max_chars: usize,
}

impl<'a, T: FetchAsync> SectionProcessor<'a, T> {
    pub fn new(
        fetcher: &'a FeedFetcher<T>,
        bias: &'a BiasHeuristic,
        timezone: Tz,
        summary_max_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            bias,
            timezone,
            summary_max_chars,
        }
    }

    /// Produce the section's records, newest first, at most `max_items`.
    #[instrument(level = "info", skip_all, fields(section = %section.name, url = %section.url))]
    pub async fn process(
        &self,
        section: &SectionConfig,
        now: DateTime<Tz>,
        window: chrono::Duration,
        allow_extract: bool,
    ) -> Vec<ArticleRecord> {
        info!("Fetching feed");
        let bytes = match self.fetcher.fetch(&section.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Feed fetch failed; section produces no items");
                return Vec::new();
            }
        };
        let entries = match feed::parse_feed(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    error = %e,
                    body_preview = %truncate_for_log(&String::from_utf8_lossy(&bytes), 200),
                    "Feed parse failed; section produces no items"
                );
                return Vec::new();
            }
        };

        let total = entries.len();
        let window_start = now - window;
        let mut records = Vec::with_capacity(total);
        for entry in entries {
            if let Some(record) = self.normalize_entry(entry, section, &window_start, allow_extract).await {
                records.push(record);
            }
        }

        // Stable: equal timestamps keep feed order.
        records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        records.truncate(section.max_items);
        info!(entries = total, kept = records.len(), "Section processed");
        records
    }

    async fn normalize_entry(
        &self,
        entry: RawEntry,
        section: &SectionConfig,
        window_start: &DateTime<Tz>,
        allow_extract: bool,
    ) -> Option<ArticleRecord> {
        let link = entry.get("link").map(|l| l.trim().to_string());
        let Some(raw_date) = entry.first_of(&DATE_FIELDS) else {
            debug!(link = ?link, "Entry has no date field; dropped");
            return None;
        };
        let published = match dates::normalize(raw_date, self.timezone) {
            Ok(dt) => dt,
            Err(e) => {
                debug!(link = ?link, error = %e, "Entry date unparseable; dropped");
                return None;
            }
        };
        if published < *window_start {
            debug!(link = ?link, published = %published, "Entry outside recency window; dropped");
            return None;
        }

        let title = clean_text(entry.get("title").unwrap_or_default());
        let summary_source = entry.first_of(&SUMMARY_FIELDS).unwrap_or_default();
        let mut summary = summarize(summary_source, self.summary_max_chars);

        if summary.is_empty() && allow_extract {
            if let Some(url) = link.as_deref() {
                match article::fetch_article_text(self.fetcher, url).await {
                    Ok(text) => summary = summarize(&text, self.summary_max_chars),
                    Err(e) => warn!(%url, section = %section.name, error = %e, "Extraction failed; keeping empty summary"),
                }
            }
        }

        let bias_heuristic = self.bias.compute(link.as_deref().unwrap_or(""), &title, &summary);
        let id = stable_id(link.as_deref().unwrap_or(&title));

        Some(ArticleRecord {
            id,
            url: link,
            title,
            published_at: published.fixed_offset(),
            section: section.name.clone(),
            summary_auto: summary,
            bias_heuristic,
        })
    }
}
