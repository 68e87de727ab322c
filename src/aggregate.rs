//! Cross-section aggregation into the final [`Snapshot`].
//!
//! Sections are processed strictly one after another with a jittered pause
//! between them; upstream feeds are rate-sensitive and the pause is the
//! run's backpressure. Results are then merged, globally sorted newest
//! first and deduplicated on `(url, lowercased title)`, keeping the first
//! (newest) occurrence.

use crate::bias::BiasHeuristic;
use crate::config::{AppConfig, DedupPolicy};
use crate::fetch::{FeedFetcher, FetchAsync, section_pause};
use crate::models::{ArticleRecord, Snapshot};
use crate::section::SectionProcessor;
use chrono::DateTime;
use chrono_tz::Tz;
use itertools::Itertools;
use tokio::time::sleep;
use tracing::{debug, info, instrument};
use url::Url;

pub struct Aggregator<'a, T> {
    config: &'a AppConfig,
    fetcher: &'a FeedFetcher<T>,
    bias: &'a BiasHeuristic,
}

impl<'a, T: FetchAsync> Aggregator<'a, T> {
    pub fn new(config: &'a AppConfig, fetcher: &'a FeedFetcher<T>, bias: &'a BiasHeuristic) -> Self {
        Self { config, fetcher, bias }
    }

    /// Process every configured section and assemble the snapshot.
    ///
    /// `now` anchors the recency window and becomes `generated_at`.
    #[instrument(level = "info", skip_all, fields(now = %now))]
    pub async fn run(&self, now: DateTime<Tz>) -> Snapshot {
        let per_section = self.collect(now).await;
        self.aggregate(per_section, now)
    }

    /// Run each section in configuration order, one at a time.
    pub async fn collect(&self, now: DateTime<Tz>) -> Vec<Vec<ArticleRecord>> {
        let processor = SectionProcessor::new(
            self.fetcher,
            self.bias,
            self.config.timezone,
            self.config.summary_max_chars,
        );
        let sections = &self.config.sections;
        let mut results = Vec::with_capacity(sections.len());

        for (i, section) in sections.iter().enumerate() {
            let items = processor
                .process(section, now, self.config.window, self.config.allow_extract)
                .await;
            info!(section = %section.key, count = items.len(), "Collected section");
            results.push(items);

            if i + 1 < sections.len() {
                let pause = section_pause(self.config.rate_limit, self.config.section_pause_floor);
                debug!(?pause, "Pausing between sections");
                sleep(pause).await;
            }
        }
        results
    }

    /// Merge per-section results into the snapshot.
    pub fn aggregate(&self, per_section: Vec<Vec<ArticleRecord>>, now: DateTime<Tz>) -> Snapshot {
        let items = merge(per_section, &self.config.dedup);
        info!(count = items.len(), "Aggregated snapshot items");
        Snapshot {
            source: self.config.source.clone(),
            generated_at: now.fixed_offset(),
            timezone: self.config.timezone.name().to_string(),
            items,
        }
    }
}

/// Concatenate, sort newest first (stable) and drop later duplicates.
pub fn merge(per_section: Vec<Vec<ArticleRecord>>, dedup: &DedupPolicy) -> Vec<ArticleRecord> {
    let mut items: Vec<ArticleRecord> = per_section.into_iter().flatten().collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let before = items.len();
    let items: Vec<ArticleRecord> = items
        .into_iter()
        .unique_by(|r| dedup_key(r, dedup))
        .collect();
    debug!(before, after = items.len(), "Deduplicated");
    items
}

/// `(url, lowercased title)`; a missing URL is its own value.
fn dedup_key(record: &ArticleRecord, dedup: &DedupPolicy) -> (Option<String>, String) {
    (
        record.url.as_deref().map(|u| comparable_url(u, dedup)),
        record.title.to_lowercase(),
    )
}

fn comparable_url(url: &str, dedup: &DedupPolicy) -> String {
    let mut out = url.to_string();
    if dedup.ignore_query {
        out = match Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
        };
    }
    if dedup.ignore_trailing_slash {
        out.truncate(out.trim_end_matches('/').len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{MockTransport, Reply};
    use crate::models::{ArticleType, BiasReport, SubjectivityHint};
    use chrono::TimeZone;
    use chrono_tz::America::Toronto;

    fn record(url: Option<&str>, title: &str, section: &str, rfc3339: &str) -> ArticleRecord {
        ArticleRecord {
            id: crate::utils::stable_id(url.unwrap_or(title)),
            url: url.map(str::to_string),
            title: title.to_string(),
            published_at: DateTime::parse_from_rfc3339(rfc3339).unwrap(),
            section: section.to_string(),
            summary_auto: String::new(),
            bias_heuristic: BiasReport {
                article_type: ArticleType::News,
                sentiment: 0.0,
                subjectivity_hint: SubjectivityHint::Low,
            },
        }
    }

    fn config(yaml_sections: &str) -> AppConfig {
        AppConfig::from_yaml_str(&format!(
            "timezone: America/Toronto\nrate_limit_seconds: 0\nsection_pause_floor_seconds: 0\nsections:\n{yaml_sections}"
        ))
        .unwrap()
    }

    #[test]
    fn test_cross_section_duplicate_keeps_newest() {
        let url = Some("https://cbc.ca/news/world/story-1");
        let merged = merge(
            vec![
                vec![record(url, "Story One", "Top", "2025-11-05T08:00:00-05:00")],
                vec![record(url, "STORY one", "World", "2025-11-05T09:00:00-05:00")],
            ],
            &DedupPolicy::default(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].section, "World");
    }

    #[test]
    fn test_sorted_newest_first_and_stable() {
        let merged = merge(
            vec![
                vec![
                    record(Some("https://a/1"), "A", "s1", "2025-11-05T01:00:00Z"),
                    record(Some("https://a/2"), "B", "s1", "2025-11-05T03:00:00Z"),
                ],
                vec![
                    record(Some("https://a/3"), "C", "s2", "2025-11-05T03:00:00Z"),
                    record(Some("https://a/4"), "D", "s2", "2025-11-05T02:00:00Z"),
                ],
            ],
            &DedupPolicy::default(),
        );
        let titles: Vec<&str> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["B", "C", "D", "A"]);
    }

    #[test]
    fn test_missing_urls_collide_on_title() {
        let merged = merge(
            vec![vec![
                record(None, "Weather alert", "s1", "2025-11-05T03:00:00Z"),
                record(None, "weather ALERT", "s1", "2025-11-05T02:00:00Z"),
                record(Some("https://a/w"), "Weather alert", "s1", "2025-11-05T01:00:00Z"),
            ]],
            &DedupPolicy::default(),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url, None);
        assert_eq!(merged[1].url.as_deref(), Some("https://a/w"));
    }

    #[test]
    fn test_url_case_and_variants_are_distinct_by_default() {
        let records = vec![vec![
            record(Some("https://a/Story"), "T", "s", "2025-11-05T03:00:00Z"),
            record(Some("https://a/story"), "T", "s", "2025-11-05T02:00:00Z"),
            record(Some("https://a/story/"), "T", "s", "2025-11-05T01:00:00Z"),
            record(Some("https://a/story?cmp=rss"), "T", "s", "2025-11-05T00:00:00Z"),
        ]];
        assert_eq!(merge(records.clone(), &DedupPolicy::default()).len(), 4);

        let lenient = DedupPolicy {
            ignore_trailing_slash: true,
            ignore_query: true,
        };
        let merged = merge(records, &lenient);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].url.as_deref(), Some("https://a/story"));
    }

    #[test]
    fn test_comparable_url() {
        let both = DedupPolicy {
            ignore_trailing_slash: true,
            ignore_query: true,
        };
        assert_eq!(comparable_url("https://a.ca/x/?q=1#frag", &both), "https://a.ca/x");
        assert_eq!(comparable_url("not a url/?q", &both), "not a url");
        assert_eq!(comparable_url("https://a.ca/x/", &DedupPolicy::default()), "https://a.ca/x/");
    }

    const WORLD: &str = "https://feeds.test/world";
    const TOP: &str = "https://feeds.test/top";

    fn feed(items: &[(&str, &str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, date)| {
                format!("<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>")
            })
            .collect();
        format!("<rss><channel>{body}</channel></rss>")
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let shared = "https://cbc.ca/news/world/shared";
        let transport = MockTransport::new()
            .body(
                TOP,
                feed(&[
                    ("Shared story", shared, "Wed, 05 Nov 2025 12:00:00 GMT"),
                    ("Top only", "https://cbc.ca/news/top-1", "Wed, 05 Nov 2025 11:00:00 GMT"),
                    ("Too old", "https://cbc.ca/news/top-2", "Sat, 01 Nov 2025 11:00:00 GMT"),
                ]),
            )
            .body(
                WORLD,
                feed(&[("Shared story", shared, "Wed, 05 Nov 2025 13:00:00 GMT")]),
            );
        let config = config(&format!(
            "  top: {{name: Top Stories, url: '{TOP}', max_items: 10}}\n  world: {{name: World, url: '{WORLD}', max_items: 10}}\n"
        ));
        let fetcher = FeedFetcher::new(&transport, crate::config::FetchPolicy::immediate());
        let bias = BiasHeuristic::new().unwrap();
        let aggregator = Aggregator::new(&config, &fetcher, &bias);
        let now = Toronto.with_ymd_and_hms(2025, 11, 5, 10, 0, 0).unwrap();

        let snapshot = aggregator.run(now).await;
        assert_eq!(snapshot.source, "CBC News");
        assert_eq!(snapshot.timezone, "America/Toronto");
        assert_eq!(snapshot.generated_at, now.fixed_offset());
        let got: Vec<(&str, &str)> = snapshot
            .items
            .iter()
            .map(|r| (r.title.as_str(), r.section.as_str()))
            .collect();
        assert_eq!(got, [("Shared story", "World"), ("Top only", "Top Stories")]);

        // Sections are fetched in configuration order.
        let order: Vec<String> = transport.calls().into_iter().map(|(u, _)| u).collect();
        assert_eq!(order, [TOP, WORLD]);

        // Same input and `now` give byte-identical output.
        let again = aggregator.run(now).await;
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_section_does_not_abort_run() {
        let transport = MockTransport::new()
            .route(TOP, vec![Reply::Status(500)])
            .body(WORLD, feed(&[("Survivor", "https://cbc.ca/s", "Wed, 05 Nov 2025 13:00:00 GMT")]));
        let config = config(&format!(
            "  top: {{name: Top, url: '{TOP}', max_items: 10}}\n  world: {{name: World, url: '{WORLD}', max_items: 10}}\n"
        ));
        let fetcher = FeedFetcher::new(&transport, crate::config::FetchPolicy::immediate());
        let bias = BiasHeuristic::new().unwrap();
        let now = Toronto.with_ymd_and_hms(2025, 11, 5, 10, 0, 0).unwrap();

        let snapshot = Aggregator::new(&config, &fetcher, &bias).run(now).await;
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].title, "Survivor");
    }
}
